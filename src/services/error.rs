use std::fmt;

use diesel::result::Error as DieselError;
use failure::{Backtrace, Context, Fail};
use validator::{ValidationError, ValidationErrors};

use repos::{Error as RepoError, ErrorKind as RepoErrorKind};

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

/// Business outcomes are data, not log noise: everything except `Internal`
/// is an expected result the controller turns into a client-facing response
/// via `code()`.
#[derive(Clone, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "service error - validation: {}", _0)]
    Validation(ValidationErrors),
    #[fail(display = "service error - not found")]
    NotFound,
    #[fail(display = "service error - conflict: {}", _0)]
    Conflict(Conflict),
    #[fail(display = "service error - access denied")]
    AccessDenied,
    #[fail(display = "service error - payment provider failure")]
    External,
    #[fail(display = "service error - webhook signature rejected")]
    InvalidSignature,
    #[fail(display = "service error - webhook signature outside tolerance")]
    ExpiredSignature,
    #[fail(display = "service error - internal")]
    Internal,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Fail)]
pub enum Conflict {
    #[fail(display = "space is not open for bookings")]
    SpaceInactive,
    #[fail(display = "requested range is unavailable")]
    Unavailable,
    #[fail(display = "booking is already finalised")]
    AlreadyFinalised,
    #[fail(display = "status transition is not allowed")]
    InvalidTransition,
    #[fail(display = "space still has live bookings")]
    HasLiveBookings,
    #[fail(display = "a payment already exists for this booking")]
    DuplicatePayment,
    #[fail(display = "record already exists")]
    Duplicate,
}

impl ErrorKind {
    /// Stable machine-readable code for the API surface
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation(_) => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict(_) => "conflict",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::External => "external_failure",
            ErrorKind::InvalidSignature | ErrorKind::ExpiredSignature => "invalid_signature",
            ErrorKind::Internal => "internal",
        }
    }

    /// Expected business outcomes are returned to the caller verbatim and
    /// never logged as errors; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            ErrorKind::Internal => true,
            _ => false,
        }
    }
}

impl Conflict {
    pub fn code(&self) -> &'static str {
        match self {
            Conflict::SpaceInactive => "space_inactive",
            Conflict::Unavailable => "unavailable",
            Conflict::AlreadyFinalised => "already_finalised",
            Conflict::InvalidTransition => "invalid_transition",
            Conflict::HasLiveBookings => "has_live_bookings",
            Conflict::DuplicatePayment => "duplicate_payment",
            Conflict::Duplicate => "duplicate",
        }
    }
}

derive_error_impls!();

/// Single-field validation failure without a derive in sight
pub fn validation_error(field: &'static str, code: &'static str) -> ErrorKind {
    let mut errors = ValidationErrors::new();
    errors.add(field, ValidationError::new(code));
    ErrorKind::Validation(errors)
}

impl From<RepoErrorKind> for ErrorKind {
    fn from(e: RepoErrorKind) -> Self {
        match e {
            RepoErrorKind::NotFound => ErrorKind::NotFound,
            RepoErrorKind::Constraints(_) => ErrorKind::Conflict(Conflict::Duplicate),
            RepoErrorKind::Internal => ErrorKind::Internal,
        }
    }
}

impl From<RepoError> for Error {
    fn from(e: RepoError) -> Self {
        let kind = ErrorKind::from(e.kind());
        Error::from(e.context(kind))
    }
}

// Lets repo calls run inside `conn.transaction(..)` closures that return
// service errors.
impl From<DieselError> for Error {
    fn from(e: DieselError) -> Self {
        Error::from(RepoError::from(e))
    }
}
