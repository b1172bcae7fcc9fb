//! Provider-agnostic payment gateway boundary. The services only ever see
//! this trait; a concrete provider client (Stripe et al.) lives in the
//! embedding service, and `MockPaymentGateway` covers demo mode and tests.
//! Implementations must bound their network calls with a request-scoped
//! timeout (~30s) and report failures through `Error` instead of panicking.

mod error;
mod mock;
mod types;

pub use self::error::{Error, ErrorKind};
pub use self::mock::{GatewayCall, MockPaymentGateway};
pub use self::types::*;

use models::ProviderPaymentId;

pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for the given amount; the returned client
    /// secret goes back to the renter's browser to complete the charge.
    fn create_intent(&self, input: CreateIntent) -> Result<PaymentIntent, Error>;

    /// Destination-charge variant used for owner payouts via connected
    /// accounts.
    fn create_connect_intent(&self, input: CreateConnectIntent) -> Result<PaymentIntent, Error>;

    fn refund(&self, input: CreateRefund) -> Result<RefundOutcome, Error>;

    /// Polls the provider for the intent's current status - the manual
    /// confirm path for when the webhook hasn't arrived (yet).
    fn get_intent(&self, intent_id: ProviderPaymentId) -> Result<PaymentIntent, Error>;
}
