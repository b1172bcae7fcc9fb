//! Booking operations: quoting, availability, creation, the status state
//! machine and cancellation with tiered refunds.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use diesel::Connection;
use failure::Fail;
use validator::Validate;

use client::payment_gateway::{CreateRefund, PaymentGateway};
use models::booking::{Booking, BookingRequest, BookingStatus, NewBooking, PaymentStatus, UpdateBooking};
use models::{Amount, BookingId, BookingType, ChargeStatus, ProviderPaymentId, Space, SpaceId, SpaceStatus, UpdatePayment, UserId};
use pricing::{self, FeePolicy, Quote};
use repos::{BookingsRepo, BookingsRepoImpl, DbPool, PaymentsRepo, PaymentsRepoImpl, SpacesRepo, SpacesRepoImpl};

use super::error::{validation_error, Conflict, Error, ErrorKind};
use super::types::{get_conn, ServiceResult};

#[derive(Clone, Debug, Serialize)]
pub struct CancellationOutcome {
    pub booking: Booking,
    pub refund_amount: Amount,
    pub refund_eligible: bool,
}

pub trait BookingService {
    /// Price preview for the booking screen; does not touch the calendar
    fn quote(&self, space_id: SpaceId, start: NaiveDateTime, end: NaiveDateTime) -> ServiceResult<Quote>;

    fn is_available(&self, space_id: SpaceId, start: NaiveDateTime, end: NaiveDateTime) -> ServiceResult<bool>;

    /// Creates a pending booking. Space status and availability are
    /// re-checked inside the insert transaction, so a stale search result
    /// cannot double-book the space.
    fn create(&self, renter_id: UserId, request: BookingRequest) -> ServiceResult<Booking>;

    fn get(&self, booking_id: BookingId, acting_user: UserId) -> ServiceResult<Booking>;
    fn list_for_renter(&self, renter_id: UserId) -> ServiceResult<Vec<Booking>>;
    fn list_for_owner(&self, owner_id: UserId) -> ServiceResult<Vec<Booking>>;

    /// Walks the booking through its state machine. Check-in stamps
    /// `check_in_time`, check-out stamps `check_out_time` and credits the
    /// space's running totals in the same transaction.
    fn update_status(&self, booking_id: BookingId, new_status: BookingStatus, acting_user: UserId) -> ServiceResult<Booking>;

    /// Cancels a live booking, refunding per the notice tiers. The provider
    /// refund happens outside the cancel transaction; a provider failure
    /// leaves the booking untouched.
    fn cancel(&self, booking_id: BookingId, acting_user: UserId, reason: Option<String>) -> ServiceResult<CancellationOutcome>;

    /// Applies a payment outcome to the booking; `paid` auto-confirms a
    /// pending booking.
    fn update_payment_status(
        &self,
        booking_id: BookingId,
        status: PaymentStatus,
        provider_payment_id: Option<ProviderPaymentId>,
    ) -> ServiceResult<Booking>;
}

pub struct BookingServiceImpl {
    pub db_pool: DbPool,
    pub gateway: Arc<dyn PaymentGateway>,
    pub fees: FeePolicy,
}

impl BookingServiceImpl {
    pub fn new(db_pool: DbPool, gateway: Arc<dyn PaymentGateway>, fees: FeePolicy) -> Self {
        Self { db_pool, gateway, fees }
    }

    /// Range sanity plus the listing's own duration limits
    fn checked_duration(space: &Space, start: NaiveDateTime, end: NaiveDateTime) -> ServiceResult<f64> {
        let hours = pricing::duration_hours(start, end).map_err(|_| Error::from(validation_error("time_range", "end_before_start")))?;
        if hours < space.min_booking_hours as f64 {
            return Err(Error::from(validation_error("time_range", "below_minimum_duration")));
        }
        if hours > space.max_booking_days as f64 * 24.0 {
            return Err(Error::from(validation_error("time_range", "above_maximum_duration")));
        }
        Ok(hours)
    }

    fn bookable_space<R: SpacesRepo>(spaces_repo: &R, space_id: SpaceId) -> ServiceResult<Space> {
        let space = spaces_repo.get(space_id)?.ok_or_else(|| Error::from(ErrorKind::NotFound))?;
        if space.status != SpaceStatus::Active {
            return Err(Error::from(ErrorKind::Conflict(Conflict::SpaceInactive)));
        }
        Ok(space)
    }
}

impl BookingService for BookingServiceImpl {
    fn quote(&self, space_id: SpaceId, start: NaiveDateTime, end: NaiveDateTime) -> ServiceResult<Quote> {
        debug!("Quoting space {} for [{} - {}]", space_id, start, end);

        let conn = get_conn(&self.db_pool)?;
        let spaces_repo = SpacesRepoImpl::new(&*conn);

        let space = Self::bookable_space(&spaces_repo, space_id)?;
        Self::checked_duration(&space, start, end)?;

        pricing::quote(start, end, space.price_per_hour, space.price_per_day, &self.fees)
            .map_err(|_| Error::from(validation_error("time_range", "end_before_start")))
    }

    fn is_available(&self, space_id: SpaceId, start: NaiveDateTime, end: NaiveDateTime) -> ServiceResult<bool> {
        if end <= start {
            return Err(Error::from(validation_error("time_range", "end_before_start")));
        }

        let conn = get_conn(&self.db_pool)?;
        let bookings_repo = BookingsRepoImpl::new(&*conn);
        let overlap = bookings_repo.has_overlap(space_id, start, end)?;
        Ok(!overlap)
    }

    fn create(&self, renter_id: UserId, request: BookingRequest) -> ServiceResult<Booking> {
        info!(
            "Creating booking for renter {} on space {} [{} - {}]",
            renter_id, request.space_id, request.start_time, request.end_time
        );

        request
            .validate()
            .map_err(|e| Error::from(ErrorKind::Validation(e)))?;

        let conn = get_conn(&self.db_pool)?;
        conn.transaction::<Booking, Error, _>(|| {
            let spaces_repo = SpacesRepoImpl::new(&*conn);
            let bookings_repo = BookingsRepoImpl::new(&*conn);

            let space = Self::bookable_space(&spaces_repo, request.space_id)?;
            let hours = Self::checked_duration(&space, request.start_time, request.end_time)?;

            if bookings_repo.has_overlap(request.space_id, request.start_time, request.end_time)? {
                return Err(Error::from(ErrorKind::Conflict(Conflict::Unavailable)));
            }

            let total_price = pricing::compute_price(hours, space.price_per_hour, space.price_per_day);
            let split = pricing::split_platform_fee(total_price, self.fees.platform_percent);

            let booking = bookings_repo.create(NewBooking {
                id: BookingId::generate(),
                space_id: space.id,
                renter_id,
                owner_id: space.owner_id,
                start_time: request.start_time,
                end_time: request.end_time,
                vehicle_reg: request.vehicle_reg,
                vehicle_model: request.vehicle_model,
                total_price,
                platform_fee: split.fee,
                owner_payout: split.payout,
                booking_status: BookingStatus::Pending,
                payment_status: PaymentStatus::Pending,
            })?;
            Ok(booking)
        })
    }

    fn get(&self, booking_id: BookingId, acting_user: UserId) -> ServiceResult<Booking> {
        let conn = get_conn(&self.db_pool)?;
        let bookings_repo = BookingsRepoImpl::new(&*conn);

        let booking = bookings_repo.get(booking_id)?.ok_or_else(|| Error::from(ErrorKind::NotFound))?;
        if booking.actor_role(acting_user).is_none() {
            return Err(Error::from(ErrorKind::AccessDenied));
        }
        Ok(booking)
    }

    fn list_for_renter(&self, renter_id: UserId) -> ServiceResult<Vec<Booking>> {
        let conn = get_conn(&self.db_pool)?;
        let bookings_repo = BookingsRepoImpl::new(&*conn);
        Ok(bookings_repo.list_by_renter(renter_id)?)
    }

    fn list_for_owner(&self, owner_id: UserId) -> ServiceResult<Vec<Booking>> {
        let conn = get_conn(&self.db_pool)?;
        let bookings_repo = BookingsRepoImpl::new(&*conn);
        Ok(bookings_repo.list_by_owner(owner_id)?)
    }

    fn update_status(&self, booking_id: BookingId, new_status: BookingStatus, acting_user: UserId) -> ServiceResult<Booking> {
        info!("User {} moving booking {} to {}", acting_user, booking_id, new_status);

        let now = Utc::now().naive_utc();
        let conn = get_conn(&self.db_pool)?;
        conn.transaction::<Booking, Error, _>(|| {
            let bookings_repo = BookingsRepoImpl::new(&*conn);
            let spaces_repo = SpacesRepoImpl::new(&*conn);

            let booking = bookings_repo.get(booking_id)?.ok_or_else(|| Error::from(ErrorKind::NotFound))?;
            let role = booking.actor_role(acting_user).ok_or_else(|| Error::from(ErrorKind::AccessDenied))?;

            if !booking.booking_status.can_transition_to(new_status) {
                return Err(Error::from(ErrorKind::Conflict(Conflict::InvalidTransition)));
            }

            let mut update = UpdateBooking {
                booking_status: Some(new_status),
                ..Default::default()
            };
            match new_status {
                BookingStatus::Active => {
                    update.check_in_time = Some(now);
                }
                BookingStatus::Completed => {
                    update.check_out_time = Some(now);
                    spaces_repo.credit_completed_booking(booking.space_id, booking.owner_payout)?;
                }
                BookingStatus::Cancelled => {
                    update.cancelled_by = Some(role);
                }
                _ => {}
            }

            Ok(bookings_repo.update(booking_id, update)?)
        })
    }

    fn cancel(&self, booking_id: BookingId, acting_user: UserId, reason: Option<String>) -> ServiceResult<CancellationOutcome> {
        info!("User {} cancelling booking {}", acting_user, booking_id);

        let now = Utc::now().naive_utc();
        let conn = get_conn(&self.db_pool)?;

        let (booking, role, refund, payment) = {
            let bookings_repo = BookingsRepoImpl::new(&*conn);
            let payments_repo = PaymentsRepoImpl::new(&*conn);

            let booking = bookings_repo.get(booking_id)?.ok_or_else(|| Error::from(ErrorKind::NotFound))?;
            let role = booking.actor_role(acting_user).ok_or_else(|| Error::from(ErrorKind::AccessDenied))?;
            if booking.booking_status.is_terminal() {
                return Err(Error::from(ErrorKind::Conflict(Conflict::AlreadyFinalised)));
            }

            let refund = pricing::compute_refund(booking.total_price, booking.payment_status, booking.start_time, now, &self.fees);
            let payment = payments_repo.get_by_booking(BookingType::CustomerSpace, booking.id.into_inner())?;
            (booking, role, refund, payment)
        };

        // Provider refund first, with no transaction held open: if the
        // provider says no, local state is untouched and the caller can
        // retry.
        if !refund.amount.is_zero() {
            if let Some(intent_id) = payment.as_ref().and_then(|p| p.provider_payment_id.clone()) {
                let full_refund = refund.amount == booking.total_price;
                self.gateway
                    .refund(CreateRefund {
                        intent_id,
                        amount: if full_refund { None } else { Some(refund.amount) },
                        reason: reason.clone(),
                    })
                    .map_err(|e| {
                        warn!("Gateway refused refund for booking {}: {}", booking_id, e);
                        Error::from(e.context(ErrorKind::External))
                    })?;
            }
        }

        let cancelled = conn.transaction::<Booking, Error, _>(|| {
            let bookings_repo = BookingsRepoImpl::new(&*conn);
            let payments_repo = PaymentsRepoImpl::new(&*conn);

            let current = bookings_repo.get(booking_id)?.ok_or_else(|| Error::from(ErrorKind::NotFound))?;
            if current.booking_status.is_terminal() {
                return Err(Error::from(ErrorKind::Conflict(Conflict::AlreadyFinalised)));
            }

            let new_payment_status = if refund.amount == booking.total_price && !refund.amount.is_zero() {
                Some(PaymentStatus::Refunded)
            } else if !refund.amount.is_zero() {
                Some(PaymentStatus::PartialRefund)
            } else {
                None
            };

            if !refund.amount.is_zero() {
                if let Some(payment) = payment.as_ref() {
                    payments_repo.update(
                        payment.id,
                        UpdatePayment {
                            status: Some(if refund.amount == booking.total_price {
                                ChargeStatus::Refunded
                            } else {
                                ChargeStatus::PartialRefund
                            }),
                            refund_amount: Some(refund.amount),
                            ..Default::default()
                        },
                    )?;
                }
            }

            Ok(bookings_repo.update(
                booking_id,
                UpdateBooking {
                    booking_status: Some(BookingStatus::Cancelled),
                    payment_status: new_payment_status,
                    cancelled_by: Some(role),
                    cancellation_reason: reason.clone(),
                    ..Default::default()
                },
            )?)
        })?;

        Ok(CancellationOutcome {
            booking: cancelled,
            refund_amount: refund.amount,
            refund_eligible: refund.eligible,
        })
    }

    fn update_payment_status(
        &self,
        booking_id: BookingId,
        status: PaymentStatus,
        provider_payment_id: Option<ProviderPaymentId>,
    ) -> ServiceResult<Booking> {
        info!("Setting payment status of booking {} to {}", booking_id, status);

        let conn = get_conn(&self.db_pool)?;
        conn.transaction::<Booking, Error, _>(|| {
            let bookings_repo = BookingsRepoImpl::new(&*conn);
            let payments_repo = PaymentsRepoImpl::new(&*conn);

            let booking = bookings_repo.get(booking_id)?.ok_or_else(|| Error::from(ErrorKind::NotFound))?;

            let mut update = UpdateBooking {
                payment_status: Some(status),
                ..Default::default()
            };
            // Successful payment auto-confirms a pending booking
            if status == PaymentStatus::Paid && booking.booking_status == BookingStatus::Pending {
                update.booking_status = Some(BookingStatus::Confirmed);
            }

            if let Some(provider_payment_id) = provider_payment_id {
                if let Some(payment) = payments_repo.get_by_booking(BookingType::CustomerSpace, booking.id.into_inner())? {
                    payments_repo.update(
                        payment.id,
                        UpdatePayment {
                            provider_payment_id: Some(provider_payment_id),
                            ..Default::default()
                        },
                    )?;
                }
            }

            Ok(bookings_repo.update(booking_id, update)?)
        })
    }
}
