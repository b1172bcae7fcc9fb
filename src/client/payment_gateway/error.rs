use std::fmt;

use failure::{Backtrace, Context, Fail};

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum ErrorKind {
    /// Provider unreachable or timed out - retryable
    #[fail(display = "payment gateway error - provider unavailable")]
    Unavailable,
    /// Provider understood the request and said no
    #[fail(display = "payment gateway error - request rejected by provider")]
    Rejected,
    #[fail(display = "payment gateway error - malformed provider response")]
    MalformedResponse,
}

derive_error_impls!();
