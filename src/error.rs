use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database connection lost: {0}")]
    ConnectionLost(#[source] rusqlite::Error),

    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    #[error("Database connection lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, StoreError::ConnectionLost(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if is_connection_loss(&err) {
            StoreError::ConnectionLost(err)
        } else {
            StoreError::Database(err)
        }
    }
}

/// SQLite result codes that mean the underlying file handle is gone
fn is_connection_loss(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.code,
            ErrorCode::CannotOpen | ErrorCode::SystemIoFailure | ErrorCode::NotADatabase
        ),
        _ => false,
    }
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Failed to fetch listing: {0:#}")]
    Fetch(anyhow::Error),

    #[error("{0:#}")]
    Adapter(anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BotError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, BotError::Store(e) if e.is_connection_lost())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: std::os::raw::c_int) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn test_io_failure_is_connection_loss() {
        let err = StoreError::from(sqlite_failure(rusqlite::ffi::SQLITE_IOERR));
        assert!(err.is_connection_lost());

        let err = StoreError::from(sqlite_failure(rusqlite::ffi::SQLITE_CANTOPEN));
        assert!(BotError::from(err).is_connection_lost());
    }

    #[test]
    fn test_constraint_is_not_connection_loss() {
        let err = StoreError::from(sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT));
        assert!(!err.is_connection_lost());
        assert!(!BotError::Fetch(anyhow::anyhow!("timeout")).is_connection_lost());
    }
}
