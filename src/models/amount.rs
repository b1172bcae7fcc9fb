use std::fmt::{self, Display};
use std::io::prelude::*;

use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::BigInt;

/// This is a wrapper for monetary amounts in minor units (pence for GBP,
/// cents for USD/EUR), the same representation the payment provider uses on
/// the wire. Keeping money integral makes the fee identity
/// `total == platform_fee + owner_payout` exact with no decimal rounding
/// drift. It has json and postgres serialization / deserialization
/// implemented.
///
/// As a monetary amount it only implements checked arithmetic.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, FromSqlRow, AsExpression)]
#[sql_type = "BigInt"]
pub struct Amount(i64);

impl Amount {
    pub fn new(v: i64) -> Self {
        Amount(v)
    }

    pub fn zero() -> Self {
        Amount(0)
    }

    pub fn inner(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Make addition, return None on overflow
    pub fn checked_add(&self, other: Amount) -> Option<Self> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Make subtraction, return None on overflow
    pub fn checked_sub(&self, other: Amount) -> Option<Self> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn checked_mul(&self, factor: i64) -> Option<Self> {
        self.0.checked_mul(factor).map(Amount)
    }

    /// Rounds a fractional amount of minor units to a whole amount,
    /// half away from zero. All "round to 2 decimals" arithmetic in the
    /// pricing rules goes through here.
    pub fn from_fractional_minor_units(v: f64) -> Self {
        Amount(v.round() as i64)
    }

    /// `12.34` major units -> 1234 minor units
    pub fn from_major_units(v: f64) -> Self {
        Amount::from_fractional_minor_units(v * 100.0)
    }

    pub fn to_major_units(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

newtype_from_to_sql!(BigInt, Amount, Amount);

impl Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Integer division truncates toward zero, so the sign is carried
        // separately to survive amounts between -1.00 and 0.
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(Amount::from_fractional_minor_units(224.5), Amount::new(225));
        assert_eq!(Amount::from_fractional_minor_units(224.4), Amount::new(224));
        assert_eq!(Amount::from_major_units(15.00), Amount::new(1500));
    }

    #[test]
    fn displays_major_units() {
        assert_eq!(format!("{}", Amount::new(1275)), "12.75");
        assert_eq!(format!("{}", Amount::new(5)), "0.05");
    }

    #[test]
    fn displays_negative_amounts_with_the_sign() {
        assert_eq!(format!("{}", Amount::new(-50)), "-0.50");
        assert_eq!(format!("{}", Amount::new(-1275)), "-12.75");
        assert_eq!(format!("{}", Amount::new(-5)), "-0.05");
    }
}
