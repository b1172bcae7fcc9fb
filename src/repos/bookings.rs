use chrono::NaiveDateTime;
use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::dsl::sql;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::sql_types::{BigInt, Nullable};
use diesel::Connection;

use models::{Amount, Booking, BookingId, BookingStatus, NewBooking, PaymentStatus, SpaceId, UpdateBooking, UserId};

use schema::bookings::dsl as BookingsDsl;

use super::types::RepoResult;

/// Aggregates for the owner earnings dashboard
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct OwnerPayoutTotals {
    /// Payouts earned but not yet transferred: paid bookings that are
    /// completed or currently active
    pub pending_payout: Amount,
    /// Payouts on paid bookings created since the given month start
    pub month_earnings: Amount,
}

pub struct BookingsRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait BookingsRepo {
    fn get(&self, booking_id: BookingId) -> RepoResult<Option<Booking>>;
    fn create(&self, new_booking: NewBooking) -> RepoResult<Booking>;
    fn update(&self, booking_id: BookingId, update: UpdateBooking) -> RepoResult<Booking>;
    /// True iff a booking whose range still occupies the calendar
    /// (not cancelled, not completed) intersects [start, end)
    fn has_overlap(&self, space_id: SpaceId, start: NaiveDateTime, end: NaiveDateTime) -> RepoResult<bool>;
    fn list_by_renter(&self, renter_id: UserId) -> RepoResult<Vec<Booking>>;
    fn list_by_owner(&self, owner_id: UserId) -> RepoResult<Vec<Booking>>;
    /// Bookings in pending/confirmed/active blocking space deletion
    fn live_count_for_space(&self, space_id: SpaceId) -> RepoResult<i64>;
    fn owner_payout_totals(&self, owner_id: UserId, month_start: NaiveDateTime) -> RepoResult<OwnerPayoutTotals>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> BookingsRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> BookingsRepo for BookingsRepoImpl<'a, T> {
    fn get(&self, booking_id: BookingId) -> RepoResult<Option<Booking>> {
        debug!("Getting a booking with ID: {}", booking_id);

        let query = BookingsDsl::bookings.filter(BookingsDsl::id.eq(booking_id));
        let booking = query.get_result(self.db_conn).optional()?;
        Ok(booking)
    }

    fn create(&self, new_booking: NewBooking) -> RepoResult<Booking> {
        debug!(
            "Creating a booking with ID: {} for space {} [{} - {}]",
            new_booking.id, new_booking.space_id, new_booking.start_time, new_booking.end_time
        );

        let command = diesel::insert_into(BookingsDsl::bookings).values(&new_booking);
        let booking = command.get_result::<Booking>(self.db_conn)?;
        Ok(booking)
    }

    fn update(&self, booking_id: BookingId, update: UpdateBooking) -> RepoResult<Booking> {
        debug!("Updating a booking with ID: {}", booking_id);

        let filter = BookingsDsl::bookings.filter(BookingsDsl::id.eq(booking_id));
        let booking = diesel::update(filter).set(&update).get_result::<Booking>(self.db_conn)?;
        Ok(booking)
    }

    fn has_overlap(&self, space_id: SpaceId, start: NaiveDateTime, end: NaiveDateTime) -> RepoResult<bool> {
        debug!("Checking overlap for space {} in [{} - {}]", space_id, start, end);

        // NOT (existing.end <= start OR existing.start >= end), i.e. the
        // ranges share at least one instant
        let count: i64 = BookingsDsl::bookings
            .filter(BookingsDsl::space_id.eq(space_id))
            .filter(BookingsDsl::booking_status.ne(BookingStatus::Cancelled))
            .filter(BookingsDsl::booking_status.ne(BookingStatus::Completed))
            .filter(BookingsDsl::end_time.gt(start))
            .filter(BookingsDsl::start_time.lt(end))
            .count()
            .get_result(self.db_conn)?;
        Ok(count > 0)
    }

    fn list_by_renter(&self, renter_id: UserId) -> RepoResult<Vec<Booking>> {
        debug!("Listing bookings of renter {}", renter_id);

        let query = BookingsDsl::bookings
            .filter(BookingsDsl::renter_id.eq(renter_id))
            .order(BookingsDsl::start_time.desc());
        let bookings = query.get_results(self.db_conn)?;
        Ok(bookings)
    }

    fn list_by_owner(&self, owner_id: UserId) -> RepoResult<Vec<Booking>> {
        debug!("Listing bookings of owner {}", owner_id);

        let query = BookingsDsl::bookings
            .filter(BookingsDsl::owner_id.eq(owner_id))
            .order(BookingsDsl::start_time.desc());
        let bookings = query.get_results(self.db_conn)?;
        Ok(bookings)
    }

    fn live_count_for_space(&self, space_id: SpaceId) -> RepoResult<i64> {
        debug!("Counting live bookings of space {}", space_id);

        let count = BookingsDsl::bookings
            .filter(BookingsDsl::space_id.eq(space_id))
            .filter(BookingsDsl::booking_status.eq_any(vec![
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                BookingStatus::Active,
            ]))
            .count()
            .get_result(self.db_conn)?;
        Ok(count)
    }

    fn owner_payout_totals(&self, owner_id: UserId, month_start: NaiveDateTime) -> RepoResult<OwnerPayoutTotals> {
        debug!("Summing payouts of owner {} (month start {})", owner_id, month_start);

        let pending: Option<i64> = BookingsDsl::bookings
            .filter(BookingsDsl::owner_id.eq(owner_id))
            .filter(BookingsDsl::payment_status.eq(PaymentStatus::Paid))
            .filter(BookingsDsl::booking_status.eq_any(vec![BookingStatus::Completed, BookingStatus::Active]))
            // sum(bigint) comes back as numeric, cast it down
            .select(sql::<Nullable<BigInt>>("SUM(owner_payout)::bigint"))
            .get_result(self.db_conn)?;

        let month: Option<i64> = BookingsDsl::bookings
            .filter(BookingsDsl::owner_id.eq(owner_id))
            .filter(BookingsDsl::payment_status.eq(PaymentStatus::Paid))
            .filter(BookingsDsl::created_at.ge(month_start))
            .select(sql::<Nullable<BigInt>>("SUM(owner_payout)::bigint"))
            .get_result(self.db_conn)?;

        Ok(OwnerPayoutTotals {
            pending_payout: Amount::new(pending.unwrap_or(0)),
            month_earnings: Amount::new(month.unwrap_or(0)),
        })
    }
}
