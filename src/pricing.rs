//! Pricing engine: booking duration, tariff selection, platform fee split,
//! quote preview and the tiered cancellation refund. Everything here is pure;
//! repos and services feed it values and persist the results.
//!
//! Two distinct fee models coexist on purpose:
//! - a booking's `total_price` is what the renter pays; the 15% platform fee
//!   is deducted from it and the owner receives the remainder;
//! - a pre-booking `Quote` shows the renter a service fee *on top of* the
//!   subtotal (`total = subtotal + service_fee`).
//! They serve different screens and must not be unified silently.

use chrono::NaiveDateTime;

use models::{Amount, PaymentStatus};

/// Marketplace commission deducted from a booking's total price
pub const PLATFORM_FEE_PERCENT: f64 = 0.15;
/// Full refund when cancelling at least this long before the start
pub const FULL_REFUND_HOURS: f64 = 24.0;
/// Half refund when cancelling at least this long before the start
pub const HALF_REFUND_HOURS: f64 = 6.0;
/// Below this duration the daily tariff is never considered
const DAILY_TARIFF_MIN_HOURS: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Fail)]
pub enum PricingError {
    #[fail(display = "booking end must be after start")]
    InvalidRange,
}

/// Tunable fee and refund policy. Defaults to the marketplace standard; the
/// embedding service builds one from its `[fees]` configuration section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeePolicy {
    pub platform_percent: f64,
    pub full_refund_hours: f64,
    pub half_refund_hours: f64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        FeePolicy {
            platform_percent: PLATFORM_FEE_PERCENT,
            full_refund_hours: FULL_REFUND_HOURS,
            half_refund_hours: HALF_REFUND_HOURS,
        }
    }
}

impl<'a> From<&'a ::config::Fees> for FeePolicy {
    fn from(fees: &::config::Fees) -> Self {
        FeePolicy {
            platform_percent: fees.platform_percent,
            full_refund_hours: fees.full_refund_hours as f64,
            half_refund_hours: fees.half_refund_hours as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeeSplit {
    pub fee: Amount,
    pub payout: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Refund {
    pub amount: Amount,
    pub eligible: bool,
}

/// Pre-booking price preview. `total` is what the renter would pay:
/// subtotal plus the service fee on top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quote {
    pub hours: f64,
    pub hourly_rate: Amount,
    pub daily_rate: Option<Amount>,
    pub subtotal: Amount,
    pub service_fee: Amount,
    pub total: Amount,
}

/// Booking duration in fractional hours
pub fn duration_hours(start: NaiveDateTime, end: NaiveDateTime) -> Result<f64, PricingError> {
    if end <= start {
        return Err(PricingError::InvalidRange);
    }
    Ok((end - start).num_seconds() as f64 / 3600.0)
}

/// Selects the cheaper applicable tariff. The daily tariff kicks in from 8
/// hours, and only wins when the remainder past whole days is itself longer
/// than 8 hours or the daily rate undercuts eight hourly hours; otherwise the
/// hourly tariff applies.
pub fn compute_price(hours: f64, hourly_rate: Amount, daily_rate: Option<Amount>) -> Amount {
    if let Some(daily) = daily_rate {
        if daily.inner() > 0 && hours >= DAILY_TARIFF_MIN_HOURS {
            let days = (hours / 24.0).ceil();
            let remaining = hours % 24.0;
            let daily_undercuts_hourly = daily.inner() < hourly_rate.inner() * 8;
            if remaining > DAILY_TARIFF_MIN_HOURS || daily_undercuts_hourly {
                return Amount::from_fractional_minor_units(days * daily.inner() as f64);
            }
        }
    }
    Amount::from_fractional_minor_units(hours * hourly_rate.inner() as f64)
}

/// Splits a booking total into platform fee and owner payout. The fee is
/// rounded on its own and the payout is the exact remainder, so
/// `total == fee + payout` always holds.
pub fn split_platform_fee(total: Amount, fee_percent: f64) -> FeeSplit {
    let fee = Amount::from_fractional_minor_units(total.inner() as f64 * fee_percent);
    let payout = Amount::new(total.inner() - fee.inner());
    FeeSplit { fee, payout }
}

/// Tiered cancellation refund: full at >= 24h before start, half at >= 6h,
/// nothing inside 6h (per the given policy). Unpaid bookings are never
/// refundable.
pub fn compute_refund(
    total_price: Amount,
    payment_status: PaymentStatus,
    start_time: NaiveDateTime,
    now: NaiveDateTime,
    policy: &FeePolicy,
) -> Refund {
    if payment_status != PaymentStatus::Paid {
        return Refund {
            amount: Amount::zero(),
            eligible: false,
        };
    }

    let hours_until_start = (start_time - now).num_seconds() as f64 / 3600.0;

    if hours_until_start >= policy.full_refund_hours {
        Refund {
            amount: total_price,
            eligible: true,
        }
    } else if hours_until_start >= policy.half_refund_hours {
        Refund {
            amount: Amount::from_fractional_minor_units(total_price.inner() as f64 * 0.5),
            eligible: true,
        }
    } else {
        Refund {
            amount: Amount::zero(),
            eligible: false,
        }
    }
}

/// Price preview for the booking screen
pub fn quote(
    start: NaiveDateTime,
    end: NaiveDateTime,
    hourly_rate: Amount,
    daily_rate: Option<Amount>,
    policy: &FeePolicy,
) -> Result<Quote, PricingError> {
    let hours = duration_hours(start, end)?;
    let subtotal = compute_price(hours, hourly_rate, daily_rate);
    let service_fee = Amount::from_fractional_minor_units(subtotal.inner() as f64 * policy.platform_percent);
    let total = Amount::new(subtotal.inner() + service_fee.inner());
    Ok(Quote {
        hours,
        hourly_rate,
        daily_rate,
        subtotal,
        service_fee,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd(2026, 3, 10).and_hms(h, 0, 0)
    }

    #[test]
    fn duration_rejects_inverted_range() {
        assert_eq!(duration_hours(at(12), at(10)), Err(PricingError::InvalidRange));
        assert_eq!(duration_hours(at(12), at(12)), Err(PricingError::InvalidRange));
        assert_eq!(duration_hours(at(10), at(13)), Ok(3.0));
    }

    #[test]
    fn hourly_only_three_hours() {
        // £5/h, 3 hours -> £15.00, fee £2.25, payout £12.75
        let total = compute_price(3.0, Amount::new(500), None);
        assert_eq!(total, Amount::new(1500));

        let split = split_platform_fee(total, PLATFORM_FEE_PERCENT);
        assert_eq!(split.fee, Amount::new(225));
        assert_eq!(split.payout, Amount::new(1275));
    }

    #[test]
    fn daily_tariff_beats_hourly_for_ten_hours() {
        // £5/h, £30/day, 10 hours: remainder 10 > 8 -> one day at £30
        let total = compute_price(10.0, Amount::new(500), Some(Amount::new(3000)));
        assert_eq!(total, Amount::new(3000));
    }

    #[test]
    fn cheap_daily_rate_applies_even_with_short_remainder() {
        // 24h exactly: remainder 0, but £30 < 8 * £5 -> daily path, 1 day
        let total = compute_price(24.0, Amount::new(500), Some(Amount::new(3000)));
        assert_eq!(total, Amount::new(3000));
    }

    #[test]
    fn expensive_daily_rate_falls_through_to_hourly() {
        // 8h at £5/h = £40; daily £45 is neither undercut nor forced by the
        // remainder (8 is not > 8) -> hourly
        let total = compute_price(8.0, Amount::new(500), Some(Amount::new(4500)));
        assert_eq!(total, Amount::new(4000));
    }

    #[test]
    fn short_bookings_never_use_the_daily_tariff() {
        let total = compute_price(3.0, Amount::new(500), Some(Amount::new(1000)));
        assert_eq!(total, Amount::new(1500));
    }

    #[test]
    fn fee_identity_holds_for_awkward_totals() {
        for total in vec![1, 7, 99, 1001, 33333, 123_456_789] {
            let split = split_platform_fee(Amount::new(total), PLATFORM_FEE_PERCENT);
            assert_eq!(split.fee.inner() + split.payout.inner(), total);
            assert_eq!(
                split.fee,
                Amount::from_fractional_minor_units(total as f64 * 0.15)
            );
        }
    }

    #[test]
    fn refund_full_at_thirty_hours_out() {
        let now = at(0);
        let policy = FeePolicy::default();
        let refund = compute_refund(Amount::new(4000), PaymentStatus::Paid, now + Duration::hours(30), now, &policy);
        assert_eq!(refund.amount, Amount::new(4000));
        assert!(refund.eligible);
    }

    #[test]
    fn refund_half_at_ten_hours_out() {
        let now = at(0);
        let policy = FeePolicy::default();
        let refund = compute_refund(Amount::new(4000), PaymentStatus::Paid, now + Duration::hours(10), now, &policy);
        assert_eq!(refund.amount, Amount::new(2000));
        assert!(refund.eligible);
    }

    #[test]
    fn refund_nothing_at_three_hours_out() {
        let now = at(0);
        let policy = FeePolicy::default();
        let refund = compute_refund(Amount::new(4000), PaymentStatus::Paid, now + Duration::hours(3), now, &policy);
        assert_eq!(refund.amount, Amount::zero());
        assert!(!refund.eligible);
    }

    #[test]
    fn refund_boundaries_are_inclusive() {
        let now = at(0);
        let policy = FeePolicy::default();
        let exactly_24h = compute_refund(Amount::new(4000), PaymentStatus::Paid, now + Duration::hours(24), now, &policy);
        assert_eq!(exactly_24h.amount, Amount::new(4000));

        let exactly_6h = compute_refund(Amount::new(4000), PaymentStatus::Paid, now + Duration::hours(6), now, &policy);
        assert_eq!(exactly_6h.amount, Amount::new(2000));

        let just_under_6h = compute_refund(
            Amount::new(4000),
            PaymentStatus::Paid,
            now + Duration::hours(6) - Duration::seconds(1),
            now,
            &policy,
        );
        assert_eq!(just_under_6h.amount, Amount::zero());
        assert!(!just_under_6h.eligible);
    }

    #[test]
    fn refund_is_monotonic_in_notice() {
        let now = at(0);
        let policy = FeePolicy::default();
        let mut last = i64::max_value();
        for hours in vec![48, 25, 24, 23, 12, 6, 5, 1, 0] {
            let refund = compute_refund(Amount::new(4000), PaymentStatus::Paid, now + Duration::hours(hours), now, &policy);
            assert!(refund.amount.inner() <= last, "refund grew as notice shrank");
            last = refund.amount.inner();
        }
    }

    #[test]
    fn unpaid_bookings_are_not_refundable() {
        let now = at(0);
        let policy = FeePolicy::default();
        for status in vec![
            PaymentStatus::Pending,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
            PaymentStatus::PartialRefund,
        ] {
            let refund = compute_refund(Amount::new(4000), status, now + Duration::hours(48), now, &policy);
            assert_eq!(refund.amount, Amount::zero());
            assert!(!refund.eligible);
        }
    }

    #[test]
    fn configured_policy_overrides_the_default_tiers_and_fee() {
        let now = at(0);
        let policy = FeePolicy {
            platform_percent: 0.20,
            full_refund_hours: 48.0,
            half_refund_hours: 12.0,
        };

        // 30h notice: full under the default policy, only half under 48h/12h
        let refund = compute_refund(Amount::new(4000), PaymentStatus::Paid, now + Duration::hours(30), now, &policy);
        assert_eq!(refund.amount, Amount::new(2000));

        let none = compute_refund(Amount::new(4000), PaymentStatus::Paid, now + Duration::hours(11), now, &policy);
        assert_eq!(none.amount, Amount::zero());

        let q = quote(at(9), at(12), Amount::new(500), None, &policy).unwrap();
        assert_eq!(q.service_fee, Amount::new(300));
        assert_eq!(q.total, Amount::new(1800));
    }

    #[test]
    fn quote_fee_sits_on_top_of_the_subtotal() {
        let q = quote(at(9), at(12), Amount::new(500), None, &FeePolicy::default()).unwrap();
        assert_eq!(q.hours, 3.0);
        assert_eq!(q.subtotal, Amount::new(1500));
        assert_eq!(q.service_fee, Amount::new(225));
        assert_eq!(q.total, Amount::new(1725));
    }

    #[test]
    fn quote_subtotal_agrees_with_booking_price() {
        let hours = duration_hours(at(8), at(18)).unwrap();
        let booked = compute_price(hours, Amount::new(500), Some(Amount::new(3000)));
        let q = quote(at(8), at(18), Amount::new(500), Some(Amount::new(3000)), &FeePolicy::default()).unwrap();
        assert_eq!(q.subtotal, booked);
    }
}
