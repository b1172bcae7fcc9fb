//! Business logic of the marketplace. Services own transactions and the
//! pricing rules, talk to the database through the repos and to the payment
//! provider through the gateway trait, and report outcomes as
//! `ServiceError`s.

pub mod booking;
pub mod error;
pub mod payment;
pub mod space;
pub mod types;
pub mod webhook;

pub use self::booking::{BookingService, BookingServiceImpl, CancellationOutcome};
pub use self::error::{Conflict, Error, ErrorKind};
pub use self::payment::{apply_successful_payment, IntentOutcome, PaymentService, PaymentServiceImpl};
pub use self::space::{OwnerEarnings, SpaceService, SpaceServiceImpl};
pub use self::types::ServiceResult;
pub use self::webhook::{SignatureHeader, WebhookService, WebhookServiceImpl, SIGNATURE_TOLERANCE_SECS};
