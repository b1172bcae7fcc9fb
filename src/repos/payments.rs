use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::Connection;
use uuid::Uuid;

use models::{BookingType, NewPayment, Payment, PaymentId, ProviderPaymentId, UpdatePayment};

use schema::payments::dsl as PaymentsDsl;

use super::types::RepoResult;

pub struct PaymentsRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait PaymentsRepo {
    fn get(&self, payment_id: PaymentId) -> RepoResult<Option<Payment>>;
    /// Lookup by the provider's intent id - the webhook idempotency key
    fn get_by_provider_payment_id(&self, provider_payment_id: ProviderPaymentId) -> RepoResult<Option<Payment>>;
    /// At most one payment maps to a booking via (booking_type, booking_id)
    fn get_by_booking(&self, booking_type: BookingType, booking_id: Uuid) -> RepoResult<Option<Payment>>;
    fn create(&self, new_payment: NewPayment) -> RepoResult<Payment>;
    fn update(&self, payment_id: PaymentId, update: UpdatePayment) -> RepoResult<Payment>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> PaymentsRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> PaymentsRepo for PaymentsRepoImpl<'a, T> {
    fn get(&self, payment_id: PaymentId) -> RepoResult<Option<Payment>> {
        debug!("Getting a payment with ID: {}", payment_id);

        let query = PaymentsDsl::payments.filter(PaymentsDsl::id.eq(payment_id));
        let payment = query.get_result(self.db_conn).optional()?;
        Ok(payment)
    }

    fn get_by_provider_payment_id(&self, provider_payment_id: ProviderPaymentId) -> RepoResult<Option<Payment>> {
        debug!("Getting a payment with provider payment ID: {}", provider_payment_id);

        let query = PaymentsDsl::payments.filter(PaymentsDsl::provider_payment_id.eq(provider_payment_id));
        let payment = query.get_result(self.db_conn).optional()?;
        Ok(payment)
    }

    fn get_by_booking(&self, booking_type: BookingType, booking_id: Uuid) -> RepoResult<Option<Payment>> {
        debug!("Getting the payment of {} booking {}", booking_type, booking_id);

        let query = PaymentsDsl::payments
            .filter(PaymentsDsl::booking_type.eq(booking_type))
            .filter(PaymentsDsl::booking_id.eq(booking_id));
        let payment = query.get_result(self.db_conn).optional()?;
        Ok(payment)
    }

    fn create(&self, new_payment: NewPayment) -> RepoResult<Payment> {
        debug!("Creating a payment with ID: {}", new_payment.id);

        let command = diesel::insert_into(PaymentsDsl::payments).values(&new_payment);
        let payment = command.get_result::<Payment>(self.db_conn)?;
        Ok(payment)
    }

    fn update(&self, payment_id: PaymentId, update: UpdatePayment) -> RepoResult<Payment> {
        debug!("Updating a payment with ID: {}", payment_id);

        let filter = PaymentsDsl::payments.filter(PaymentsDsl::id.eq(payment_id));
        let payment = diesel::update(filter).set(&update).get_result::<Payment>(self.db_conn)?;
        Ok(payment)
    }
}
