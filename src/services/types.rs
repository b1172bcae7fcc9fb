use failure::Fail;

use repos::{DbConnection, DbPool};

use super::error::{Error, ErrorKind};

pub type ServiceResult<T> = Result<T, Error>;

/// Checks a connection out of the pool, mapping pool exhaustion to a fatal
/// service error.
pub fn get_conn(db_pool: &DbPool) -> ServiceResult<DbConnection> {
    db_pool.get().map_err(|e| {
        error!("Could not get a database connection: {}", e);
        Error::from(e.context(ErrorKind::Internal))
    })
}
