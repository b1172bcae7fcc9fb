use std::collections::HashMap;

use models::{Amount, Currency, ProviderPaymentId};

/// Request for a plain payment intent. `metadata` carries the
/// booking_type/booking_id pair the webhook reconciler keys on.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateIntent {
    pub amount: Amount,
    pub currency: Currency,
    pub metadata: HashMap<String, String>,
    pub customer_id: Option<String>,
    pub description: Option<String>,
}

/// Request for a destination-charge intent: the renter's payment lands on the
/// owner's connected account minus our application fee.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateConnectIntent {
    pub amount: Amount,
    pub currency: Currency,
    pub destination_account: String,
    pub application_fee: Amount,
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaymentIntent {
    pub id: ProviderPaymentId,
    pub client_secret: Option<String>,
    pub amount: Amount,
    pub status: IntentStatus,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    Processing,
    Succeeded,
    Canceled,
    Other,
}

impl IntentStatus {
    pub fn is_succeeded(&self) -> bool {
        *self == IntentStatus::Succeeded
    }
}

/// `amount: None` refunds the full remaining charge
#[derive(Clone, Debug, PartialEq)]
pub struct CreateRefund {
    pub intent_id: ProviderPaymentId,
    pub amount: Option<Amount>,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RefundOutcome {
    pub id: String,
    pub amount: Option<Amount>,
    pub status: RefundStatus,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RefundStatus {
    Pending,
    Succeeded,
    Failed,
}
