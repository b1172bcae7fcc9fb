use std::fmt::{self, Display};
use std::io::Write;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::VarChar;
use failure::Fail;
use serde_json;
use uuid::Uuid;

use models::{Amount, Currency, PaymentId, UserId};
use schema::payments;

/// The three reservation products sharing the payments table. Only
/// `customer_space` bookings live in this crate; garage and airport
/// reservations are reconciled by their own subsystems off the same rows.
#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, Eq, PartialEq, Hash)]
#[sql_type = "VarChar"]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    Garage,
    CustomerSpace,
    Airport,
}

#[derive(Debug, Clone, Fail)]
#[fail(display = "failed to parse booking type")]
pub struct ParseBookingTypeError;

impl FromStr for BookingType {
    type Err = ParseBookingTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "garage" => Ok(BookingType::Garage),
            "customer_space" => Ok(BookingType::CustomerSpace),
            "airport" => Ok(BookingType::Airport),
            _ => Err(ParseBookingTypeError),
        }
    }
}

impl FromSql<VarChar, Pg> for BookingType {
    fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
        match data {
            Some(b"garage") => Ok(BookingType::Garage),
            Some(b"customer_space") => Ok(BookingType::CustomerSpace),
            Some(b"airport") => Ok(BookingType::Airport),
            Some(v) => Err(format!(
                "Unrecognized enum variant: {:?}",
                String::from_utf8(v.to_vec()).unwrap_or_else(|_| "Non - UTF8 value".to_string()),
            )
            .into()),
            None => Err("Unexpected null for non-null column".into()),
        }
    }
}

impl ToSql<VarChar, Pg> for BookingType {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        match self {
            BookingType::Garage => out.write_all(b"garage")?,
            BookingType::CustomerSpace => out.write_all(b"customer_space")?,
            BookingType::Airport => out.write_all(b"airport")?,
        };
        Ok(IsNull::No)
    }
}

impl Display for BookingType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BookingType::Garage => f.write_str("garage"),
            BookingType::CustomerSpace => f.write_str("customer_space"),
            BookingType::Airport => f.write_str("airport"),
        }
    }
}

/// Charge state as reported by the payment provider
#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, Eq, PartialEq, Hash)]
#[sql_type = "VarChar"]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
    PartialRefund,
}

impl FromSql<VarChar, Pg> for ChargeStatus {
    fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
        match data {
            Some(b"pending") => Ok(ChargeStatus::Pending),
            Some(b"succeeded") => Ok(ChargeStatus::Succeeded),
            Some(b"failed") => Ok(ChargeStatus::Failed),
            Some(b"refunded") => Ok(ChargeStatus::Refunded),
            Some(b"partial_refund") => Ok(ChargeStatus::PartialRefund),
            Some(v) => Err(format!(
                "Unrecognized enum variant: {:?}",
                String::from_utf8(v.to_vec()).unwrap_or_else(|_| "Non - UTF8 value".to_string()),
            )
            .into()),
            None => Err("Unexpected null for non-null column".into()),
        }
    }
}

impl ToSql<VarChar, Pg> for ChargeStatus {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        match self {
            ChargeStatus::Pending => out.write_all(b"pending")?,
            ChargeStatus::Succeeded => out.write_all(b"succeeded")?,
            ChargeStatus::Failed => out.write_all(b"failed")?,
            ChargeStatus::Refunded => out.write_all(b"refunded")?,
            ChargeStatus::PartialRefund => out.write_all(b"partial_refund")?,
        };
        Ok(IsNull::No)
    }
}

impl Display for ChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChargeStatus::Pending => f.write_str("pending"),
            ChargeStatus::Succeeded => f.write_str("succeeded"),
            ChargeStatus::Failed => f.write_str("failed"),
            ChargeStatus::Refunded => f.write_str("refunded"),
            ChargeStatus::PartialRefund => f.write_str("partial_refund"),
        }
    }
}

/// The provider's intent id (`pi_...`), our idempotency key for webhooks
#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, PartialEq, Eq, Hash, Display, From)]
#[sql_type = "VarChar"]
pub struct ProviderPaymentId(String);
newtype_from_to_sql!(VarChar, ProviderPaymentId, ProviderPaymentId);

impl ProviderPaymentId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        ProviderPaymentId(id.into())
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Queryable)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub booking_type: BookingType,
    pub booking_id: Uuid,
    pub amount: Amount,
    pub currency: Currency,
    pub provider_payment_id: Option<ProviderPaymentId>,
    pub status: ChargeStatus,
    pub refund_amount: Option<Amount>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize, Serialize, Insertable)]
#[table_name = "payments"]
pub struct NewPayment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub booking_type: BookingType,
    pub booking_id: Uuid,
    pub amount: Amount,
    pub currency: Currency,
    pub provider_payment_id: Option<ProviderPaymentId>,
    pub status: ChargeStatus,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, AsChangeset)]
#[table_name = "payments"]
pub struct UpdatePayment {
    pub provider_payment_id: Option<ProviderPaymentId>,
    pub status: Option<ChargeStatus>,
    pub refund_amount: Option<Amount>,
    pub metadata: Option<serde_json::Value>,
}
