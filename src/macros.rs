//! Crate-local macros shared by the error and model modules.

/// Generates the boilerplate around a layer's `Error { inner: Context<ErrorKind> }`.
/// Expects `Error` and `ErrorKind` plus `failure::{Backtrace, Context, Fail}`
/// and `std::fmt` to be in scope at the call site.
macro_rules! derive_error_impls {
    () => {
        impl Fail for Error {
            fn cause(&self) -> Option<&Fail> {
                self.inner.cause()
            }

            fn backtrace(&self) -> Option<&Backtrace> {
                self.inner.backtrace()
            }
        }

        impl fmt::Display for Error {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&self.inner, f)
            }
        }

        impl Error {
            #[allow(dead_code)]
            pub fn kind(&self) -> ErrorKind {
                self.inner.get_context().clone()
            }
        }

        impl From<ErrorKind> for Error {
            fn from(kind: ErrorKind) -> Error {
                Error {
                    inner: Context::new(kind),
                }
            }
        }

        impl From<Context<ErrorKind>> for Error {
            fn from(inner: Context<ErrorKind>) -> Error {
                Error { inner }
            }
        }
    };
}

/// Maps a tuple-struct newtype onto the diesel serialization of its inner type.
macro_rules! newtype_from_to_sql {
    ($sql_type:ty, $type:ty, $constructor:expr) => {
        impl FromSql<$sql_type, Pg> for $type {
            fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
                FromSql::<$sql_type, Pg>::from_sql(data).map($constructor)
            }
        }

        impl ToSql<$sql_type, Pg> for $type {
            fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
                ToSql::<$sql_type, Pg>::to_sql(&self.0, out)
            }
        }
    };
}
