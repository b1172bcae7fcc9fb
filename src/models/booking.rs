use std::fmt::{self, Display};
use std::io::Write;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::VarChar;
use enum_iterator::IntoEnumIterator;
use failure::Fail;
use validator::Validate;

use models::{Amount, BookingId, SpaceId, UserId};
use schema::bookings;

/// Booking lifecycle:
///
/// `pending -> confirmed -> active -> completed`
///
/// with `cancelled` reachable from any live state and `disputed` parking a
/// live booking for manual intervention. `completed`, `cancelled` and
/// `disputed` are terminal.
#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, Eq, PartialEq, Hash, IntoEnumIterator)]
#[sql_type = "VarChar"]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Created, waiting for payment
    Pending,
    /// Payment succeeded
    Confirmed,
    /// Renter checked in
    Active,
    /// Renter checked out, owner credited
    Completed,
    Cancelled,
    Disputed,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Disputed => true,
            _ => false,
        }
    }

    /// Live bookings block the space's calendar and its deletion
    pub fn is_live(&self) -> bool {
        match self {
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Active => true,
            _ => false,
        }
    }

    /// States whose time range still counts for the overlap check
    pub fn occupies_range(&self) -> bool {
        match self {
            BookingStatus::Cancelled | BookingStatus::Completed => false,
            _ => true,
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use self::BookingStatus::*;

        match (*self, next) {
            (Pending, Confirmed) => true,
            (Confirmed, Active) => true,
            (Active, Completed) => true,
            (from, Cancelled) => from.is_live(),
            (from, Disputed) => from.is_live(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Fail)]
#[fail(display = "failed to parse booking status")]
pub struct ParseBookingStatusError;

impl FromStr for BookingStatus {
    type Err = ParseBookingStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "active" => Ok(BookingStatus::Active),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "disputed" => Ok(BookingStatus::Disputed),
            _ => Err(ParseBookingStatusError),
        }
    }
}

impl FromSql<VarChar, Pg> for BookingStatus {
    fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
        match data {
            Some(b"pending") => Ok(BookingStatus::Pending),
            Some(b"confirmed") => Ok(BookingStatus::Confirmed),
            Some(b"active") => Ok(BookingStatus::Active),
            Some(b"completed") => Ok(BookingStatus::Completed),
            Some(b"cancelled") => Ok(BookingStatus::Cancelled),
            Some(b"disputed") => Ok(BookingStatus::Disputed),
            Some(v) => Err(format!(
                "Unrecognized enum variant: {:?}",
                String::from_utf8(v.to_vec()).unwrap_or_else(|_| "Non - UTF8 value".to_string()),
            )
            .into()),
            None => Err("Unexpected null for non-null column".into()),
        }
    }
}

impl ToSql<VarChar, Pg> for BookingStatus {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        match self {
            BookingStatus::Pending => out.write_all(b"pending")?,
            BookingStatus::Confirmed => out.write_all(b"confirmed")?,
            BookingStatus::Active => out.write_all(b"active")?,
            BookingStatus::Completed => out.write_all(b"completed")?,
            BookingStatus::Cancelled => out.write_all(b"cancelled")?,
            BookingStatus::Disputed => out.write_all(b"disputed")?,
        };
        Ok(IsNull::No)
    }
}

impl Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BookingStatus::Pending => f.write_str("pending"),
            BookingStatus::Confirmed => f.write_str("confirmed"),
            BookingStatus::Active => f.write_str("active"),
            BookingStatus::Completed => f.write_str("completed"),
            BookingStatus::Cancelled => f.write_str("cancelled"),
            BookingStatus::Disputed => f.write_str("disputed"),
        }
    }
}

/// Payment state as the renter sees it on the booking row. The payment
/// provider's view lives on the `payments` table (`ChargeStatus`).
#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, Eq, PartialEq, Hash)]
#[sql_type = "VarChar"]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    PartialRefund,
    Refunded,
    Failed,
}

#[derive(Debug, Clone, Fail)]
#[fail(display = "failed to parse payment status")]
pub struct ParsePaymentStatusError;

impl FromStr for PaymentStatus {
    type Err = ParsePaymentStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "partial_refund" => Ok(PaymentStatus::PartialRefund),
            "refunded" => Ok(PaymentStatus::Refunded),
            "failed" => Ok(PaymentStatus::Failed),
            _ => Err(ParsePaymentStatusError),
        }
    }
}

impl FromSql<VarChar, Pg> for PaymentStatus {
    fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
        match data {
            Some(b"pending") => Ok(PaymentStatus::Pending),
            Some(b"paid") => Ok(PaymentStatus::Paid),
            Some(b"partial_refund") => Ok(PaymentStatus::PartialRefund),
            Some(b"refunded") => Ok(PaymentStatus::Refunded),
            Some(b"failed") => Ok(PaymentStatus::Failed),
            Some(v) => Err(format!(
                "Unrecognized enum variant: {:?}",
                String::from_utf8(v.to_vec()).unwrap_or_else(|_| "Non - UTF8 value".to_string()),
            )
            .into()),
            None => Err("Unexpected null for non-null column".into()),
        }
    }
}

impl ToSql<VarChar, Pg> for PaymentStatus {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        match self {
            PaymentStatus::Pending => out.write_all(b"pending")?,
            PaymentStatus::Paid => out.write_all(b"paid")?,
            PaymentStatus::PartialRefund => out.write_all(b"partial_refund")?,
            PaymentStatus::Refunded => out.write_all(b"refunded")?,
            PaymentStatus::Failed => out.write_all(b"failed")?,
        };
        Ok(IsNull::No)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PaymentStatus::Pending => f.write_str("pending"),
            PaymentStatus::Paid => f.write_str("paid"),
            PaymentStatus::PartialRefund => f.write_str("partial_refund"),
            PaymentStatus::Refunded => f.write_str("refunded"),
            PaymentStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Which side pulled the plug; derived from the acting user at cancel time
#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, Eq, PartialEq, Hash)]
#[sql_type = "VarChar"]
#[serde(rename_all = "lowercase")]
pub enum CancelledBy {
    Renter,
    Owner,
}

impl FromSql<VarChar, Pg> for CancelledBy {
    fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
        match data {
            Some(b"renter") => Ok(CancelledBy::Renter),
            Some(b"owner") => Ok(CancelledBy::Owner),
            Some(v) => Err(format!(
                "Unrecognized enum variant: {:?}",
                String::from_utf8(v.to_vec()).unwrap_or_else(|_| "Non - UTF8 value".to_string()),
            )
            .into()),
            None => Err("Unexpected null for non-null column".into()),
        }
    }
}

impl ToSql<VarChar, Pg> for CancelledBy {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        match self {
            CancelledBy::Renter => out.write_all(b"renter")?,
            CancelledBy::Owner => out.write_all(b"owner")?,
        };
        Ok(IsNull::No)
    }
}

impl Display for CancelledBy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CancelledBy::Renter => f.write_str("renter"),
            CancelledBy::Owner => f.write_str("owner"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Queryable)]
pub struct Booking {
    pub id: BookingId,
    pub space_id: SpaceId,
    pub renter_id: UserId,
    pub owner_id: UserId,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub vehicle_reg: Option<String>,
    pub vehicle_model: Option<String>,
    pub total_price: Amount,
    pub platform_fee: Amount,
    pub owner_payout: Amount,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
    pub check_in_time: Option<NaiveDateTime>,
    pub check_out_time: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn actor_role(&self, user_id: UserId) -> Option<CancelledBy> {
        if user_id == self.renter_id {
            Some(CancelledBy::Renter)
        } else if user_id == self.owner_id {
            Some(CancelledBy::Owner)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Insertable)]
#[table_name = "bookings"]
pub struct NewBooking {
    pub id: BookingId,
    pub space_id: SpaceId,
    pub renter_id: UserId,
    pub owner_id: UserId,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub vehicle_reg: Option<String>,
    pub vehicle_model: Option<String>,
    pub total_price: Amount,
    pub platform_fee: Amount,
    pub owner_payout: Amount,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, AsChangeset)]
#[table_name = "bookings"]
pub struct UpdateBooking {
    pub booking_status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
    pub check_in_time: Option<NaiveDateTime>,
    pub check_out_time: Option<NaiveDateTime>,
}

/// Inbound booking request, validated before pricing
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct BookingRequest {
    pub space_id: SpaceId,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[validate(length(max = 16))]
    pub vehicle_reg: Option<String>,
    #[validate(length(max = 100))]
    pub vehicle_model: Option<String>,
}
