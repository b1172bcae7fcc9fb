//! Payment intents and their reconciliation with bookings. The gateway is
//! only ever called with no database transaction open; local rows are
//! committed first and reconciled after the provider answers.

use std::collections::HashMap;
use std::sync::Arc;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Fail;
use uuid::Uuid;

use client::payment_gateway::{CreateConnectIntent, CreateIntent, CreateRefund, PaymentGateway};
use models::{
    Amount, BookingId, BookingStatus, BookingType, ChargeStatus, Currency, NewPayment, Payment, PaymentId, PaymentStatus,
    ProviderPaymentId, UpdateBooking, UpdatePayment, UserId,
};
use pricing::{self, FeePolicy};
use repos::{BookingsRepo, BookingsRepoImpl, DbPool, PaymentsRepo, PaymentsRepoImpl};

use super::error::{validation_error, Conflict, Error, ErrorKind};
use super::types::{get_conn, ServiceResult};

#[derive(Clone, Debug)]
pub struct IntentOutcome {
    pub payment: Payment,
    pub client_secret: Option<String>,
}

pub trait PaymentService {
    /// Records a pending payment for the booking and asks the provider for
    /// an intent. A failed earlier attempt is reused; a live or succeeded
    /// payment makes this a duplicate.
    fn create_intent(
        &self,
        user_id: UserId,
        booking_type: BookingType,
        booking_id: Uuid,
        amount: Amount,
        description: Option<String>,
    ) -> ServiceResult<IntentOutcome>;

    /// Destination-charge variant: the owner's connected account receives
    /// the payout share, the platform keeps the fee.
    fn create_connect_intent(
        &self,
        user_id: UserId,
        booking_type: BookingType,
        booking_id: Uuid,
        amount: Amount,
        destination_account: String,
    ) -> ServiceResult<IntentOutcome>;

    /// Manual confirm path: polls the provider and, on success, applies the
    /// same transition the webhook would.
    fn confirm(&self, payment_id: PaymentId) -> ServiceResult<Payment>;

    /// Explicit refund outside the cancellation flow. Updates the payment
    /// row and the booking's renter-facing payment status; booking status is
    /// left to the caller.
    fn refund(&self, payment_id: PaymentId, amount: Option<Amount>, reason: Option<String>) -> ServiceResult<Payment>;

    fn get_by_booking(&self, booking_type: BookingType, booking_id: Uuid) -> ServiceResult<Option<Payment>>;
}

pub struct PaymentServiceImpl {
    pub db_pool: DbPool,
    pub gateway: Arc<dyn PaymentGateway>,
    pub currency: Currency,
    pub fees: FeePolicy,
}

impl PaymentServiceImpl {
    pub fn new(db_pool: DbPool, gateway: Arc<dyn PaymentGateway>, currency: Currency, fees: FeePolicy) -> Self {
        Self {
            db_pool,
            gateway,
            currency,
            fees,
        }
    }

    fn booking_metadata(booking_type: BookingType, booking_id: Uuid) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("booking_type".to_string(), booking_type.to_string());
        metadata.insert("booking_id".to_string(), booking_id.to_string());
        metadata
    }

    /// Inserts the pending payment row (or revives a failed one) and commits
    /// before any provider call is made.
    fn prepare_payment(
        &self,
        user_id: UserId,
        booking_type: BookingType,
        booking_id: Uuid,
        amount: Amount,
    ) -> ServiceResult<Payment> {
        if amount.inner() <= 0 {
            return Err(Error::from(validation_error("amount", "must_be_positive")));
        }

        let conn = get_conn(&self.db_pool)?;
        conn.transaction::<Payment, Error, _>(|| {
            let payments_repo = PaymentsRepoImpl::new(&*conn);

            match payments_repo.get_by_booking(booking_type, booking_id)? {
                Some(ref existing) if existing.status == ChargeStatus::Failed => Ok(payments_repo.update(
                    existing.id,
                    UpdatePayment {
                        status: Some(ChargeStatus::Pending),
                        ..Default::default()
                    },
                )?),
                Some(_) => Err(Error::from(ErrorKind::Conflict(Conflict::DuplicatePayment))),
                None => Ok(payments_repo.create(NewPayment {
                    id: PaymentId::generate(),
                    user_id,
                    booking_type,
                    booking_id,
                    amount,
                    currency: self.currency,
                    provider_payment_id: None,
                    status: ChargeStatus::Pending,
                    metadata: Some(json!({
                        "booking_type": booking_type.to_string(),
                        "booking_id": booking_id.to_string(),
                    })),
                })?),
            }
        })
    }

    /// Stores the provider's intent id on the committed payment row; on
    /// provider failure marks the row failed so a later attempt can revive
    /// it.
    fn settle_intent_outcome(
        &self,
        payment: Payment,
        outcome: Result<::client::payment_gateway::PaymentIntent, ::client::payment_gateway::Error>,
    ) -> ServiceResult<IntentOutcome> {
        let conn = get_conn(&self.db_pool)?;
        let payments_repo = PaymentsRepoImpl::new(&*conn);

        match outcome {
            Ok(intent) => {
                let payment = payments_repo.update(
                    payment.id,
                    UpdatePayment {
                        provider_payment_id: Some(intent.id.clone()),
                        ..Default::default()
                    },
                )?;
                Ok(IntentOutcome {
                    payment,
                    client_secret: intent.client_secret,
                })
            }
            Err(e) => {
                warn!("Gateway refused intent for payment {}: {}", payment.id, e);
                payments_repo.update(
                    payment.id,
                    UpdatePayment {
                        status: Some(ChargeStatus::Failed),
                        ..Default::default()
                    },
                )?;
                Err(Error::from(e.context(ErrorKind::External)))
            }
        }
    }
}

impl PaymentService for PaymentServiceImpl {
    fn create_intent(
        &self,
        user_id: UserId,
        booking_type: BookingType,
        booking_id: Uuid,
        amount: Amount,
        description: Option<String>,
    ) -> ServiceResult<IntentOutcome> {
        info!("Creating intent of {} for {} booking {}", amount, booking_type, booking_id);

        let payment = self.prepare_payment(user_id, booking_type, booking_id, amount)?;
        let outcome = self.gateway.create_intent(CreateIntent {
            amount,
            currency: self.currency,
            metadata: Self::booking_metadata(booking_type, booking_id),
            customer_id: None,
            description,
        });
        self.settle_intent_outcome(payment, outcome)
    }

    fn create_connect_intent(
        &self,
        user_id: UserId,
        booking_type: BookingType,
        booking_id: Uuid,
        amount: Amount,
        destination_account: String,
    ) -> ServiceResult<IntentOutcome> {
        info!(
            "Creating connect intent of {} for {} booking {} -> {}",
            amount, booking_type, booking_id, destination_account
        );

        let split = pricing::split_platform_fee(amount, self.fees.platform_percent);
        let payment = self.prepare_payment(user_id, booking_type, booking_id, amount)?;
        let outcome = self.gateway.create_connect_intent(CreateConnectIntent {
            amount,
            currency: self.currency,
            destination_account,
            application_fee: split.fee,
            metadata: Self::booking_metadata(booking_type, booking_id),
        });
        self.settle_intent_outcome(payment, outcome)
    }

    fn confirm(&self, payment_id: PaymentId) -> ServiceResult<Payment> {
        info!("Manually confirming payment {}", payment_id);

        let (payment, intent_id) = {
            let conn = get_conn(&self.db_pool)?;
            let payments_repo = PaymentsRepoImpl::new(&*conn);
            let payment = payments_repo.get(payment_id)?.ok_or_else(|| Error::from(ErrorKind::NotFound))?;
            let intent_id = payment
                .provider_payment_id
                .clone()
                .ok_or_else(|| Error::from(validation_error("payment", "no_provider_intent")))?;
            (payment, intent_id)
        };

        if payment.status == ChargeStatus::Succeeded {
            return Ok(payment);
        }

        let intent = self.gateway.get_intent(intent_id).map_err(|e| {
            warn!("Gateway lookup failed for payment {}: {}", payment_id, e);
            Error::from(e.context(ErrorKind::External))
        })?;

        if !intent.status.is_succeeded() {
            debug!("Payment {} not succeeded at provider ({:?})", payment_id, intent.status);
            return Ok(payment);
        }

        let conn = get_conn(&self.db_pool)?;
        conn.transaction::<Payment, Error, _>(|| apply_successful_payment(&*conn, &payment, None))
    }

    fn refund(&self, payment_id: PaymentId, amount: Option<Amount>, reason: Option<String>) -> ServiceResult<Payment> {
        info!("Refunding payment {} ({:?})", payment_id, amount);

        let (payment, intent_id) = {
            let conn = get_conn(&self.db_pool)?;
            let payments_repo = PaymentsRepoImpl::new(&*conn);
            let payment = payments_repo.get(payment_id)?.ok_or_else(|| Error::from(ErrorKind::NotFound))?;
            match payment.status {
                ChargeStatus::Succeeded | ChargeStatus::PartialRefund => {}
                _ => return Err(Error::from(ErrorKind::Conflict(Conflict::InvalidTransition))),
            }
            let intent_id = payment
                .provider_payment_id
                .clone()
                .ok_or_else(|| Error::from(validation_error("payment", "no_provider_intent")))?;
            (payment, intent_id)
        };

        if let Some(requested) = amount {
            if requested.inner() <= 0 || requested > payment.amount {
                return Err(Error::from(validation_error("amount", "invalid_refund_amount")));
            }
        }

        self.gateway
            .refund(CreateRefund {
                intent_id,
                amount,
                reason,
            })
            .map_err(|e| {
                warn!("Gateway refused refund for payment {}: {}", payment_id, e);
                Error::from(e.context(ErrorKind::External))
            })?;

        let refunded = amount.unwrap_or(payment.amount);
        let full = refunded == payment.amount;

        let conn = get_conn(&self.db_pool)?;
        conn.transaction::<Payment, Error, _>(|| {
            let payments_repo = PaymentsRepoImpl::new(&*conn);
            let bookings_repo = BookingsRepoImpl::new(&*conn);

            let payment = payments_repo.update(
                payment_id,
                UpdatePayment {
                    status: Some(if full { ChargeStatus::Refunded } else { ChargeStatus::PartialRefund }),
                    refund_amount: Some(refunded),
                    ..Default::default()
                },
            )?;

            if payment.booking_type == BookingType::CustomerSpace {
                if let Some(booking) = bookings_repo.get(BookingId::new(payment.booking_id))? {
                    bookings_repo.update(
                        booking.id,
                        UpdateBooking {
                            payment_status: Some(if full { PaymentStatus::Refunded } else { PaymentStatus::PartialRefund }),
                            ..Default::default()
                        },
                    )?;
                }
            }

            Ok(payment)
        })
    }

    fn get_by_booking(&self, booking_type: BookingType, booking_id: Uuid) -> ServiceResult<Option<Payment>> {
        let conn = get_conn(&self.db_pool)?;
        let payments_repo = PaymentsRepoImpl::new(&*conn);
        Ok(payments_repo.get_by_booking(booking_type, booking_id)?)
    }
}

/// Marks the payment succeeded and flips the linked customer-space booking
/// to paid/confirmed. Shared by the webhook reconciler and the manual
/// confirm path, and idempotent: a payment already marked succeeded is
/// returned as-is.
pub fn apply_successful_payment<T>(conn: &T, payment: &Payment, provider_payment_id: Option<ProviderPaymentId>) -> ServiceResult<Payment>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
{
    let payments_repo = PaymentsRepoImpl::new(conn);
    let bookings_repo = BookingsRepoImpl::new(conn);

    if payment.status == ChargeStatus::Succeeded {
        debug!("Payment {} already succeeded, nothing to apply", payment.id);
        return Ok(payment.clone());
    }

    let updated = payments_repo.update(
        payment.id,
        UpdatePayment {
            status: Some(ChargeStatus::Succeeded),
            provider_payment_id,
            ..Default::default()
        },
    )?;

    if payment.booking_type == BookingType::CustomerSpace {
        match bookings_repo.get(BookingId::new(payment.booking_id))? {
            Some(ref booking) if booking.payment_status != PaymentStatus::Paid => {
                let booking_status = if booking.booking_status == BookingStatus::Pending {
                    Some(BookingStatus::Confirmed)
                } else {
                    None
                };
                bookings_repo.update(
                    booking.id,
                    UpdateBooking {
                        payment_status: Some(PaymentStatus::Paid),
                        booking_status,
                        ..Default::default()
                    },
                )?;
            }
            Some(_) => {}
            None => warn!(
                "Payment {} references missing customer_space booking {}",
                payment.id, payment.booking_id
            ),
        }
    }

    Ok(updated)
}
