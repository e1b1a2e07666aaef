use chainops_common::error::ExecutionErrorKind;
use thiserror::Error;

/// Datastore-facing error taxonomy. A `sqlx::Error` is mapped once at the
/// boundary so the rest of the crate never matches on driver internals.
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("datastore misconfigured: {0}")]
    Configuration(String),

    #[error("datastore rejected credentials: {0}")]
    Unauthorized(String),

    #[error("malformed row data: {0}")]
    InvalidData(String),

    #[error("datastore connection error: {0}")]
    Connection(String),

    #[error("ledger credit failed: {0}")]
    Ledger(String),
}

impl DatastoreError {
    pub fn classify(&self) -> ExecutionErrorKind {
        match self {
            Self::Configuration(_) => ExecutionErrorKind::Configuration,
            Self::Unauthorized(_) => ExecutionErrorKind::Unauthorized,
            Self::InvalidData(_) => ExecutionErrorKind::InvalidData,
            Self::Connection(_) => ExecutionErrorKind::NetworkError,
            Self::Ledger(_) => ExecutionErrorKind::LedgerError,
        }
    }
}

impl From<sqlx::Error> for DatastoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("28P01") => {
                Self::Unauthorized(e.to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Self::Connection(e.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::InvalidData(e.to_string())
            }
            _ => Self::Connection(e.to_string()),
        }
    }
}
