//! Repos is a module responsible for direct interaction with the database.
//! Every repo wraps one table; business rules composing several repos live in
//! the service layer.

pub mod bookings;
pub mod error;
pub mod payments;
pub mod spaces;
pub mod types;

pub use self::bookings::{BookingsRepo, BookingsRepoImpl, OwnerPayoutTotals};
pub use self::error::{Error, ErrorKind, ErrorSource};
pub use self::payments::{PaymentsRepo, PaymentsRepoImpl};
pub use self::spaces::{SpaceSearchResult, SpacesRepo, SpacesRepoImpl, MAX_SEARCH_LIMIT};
pub use self::types::{DbConnection, DbPool, RepoResult};
