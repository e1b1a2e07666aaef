use chainops_common::error::ExecutionErrorKind;
use thiserror::Error;

/// Chain-adapter error taxonomy, grounded on the same retry/fail-fast split as
/// the signer (§4.1 "Retries: exponential backoff on transient network errors;
/// fail-fast on auth/config").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain misconfigured: {0}")]
    Configuration(String),

    #[error("chain rpc rejected request: {0}")]
    Unauthorized(String),

    #[error("malformed chain data: {0}")]
    InvalidData(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl ChainError {
    pub fn classify(&self) -> ExecutionErrorKind {
        match self {
            Self::Configuration(_) => ExecutionErrorKind::Configuration,
            Self::Unauthorized(_) => ExecutionErrorKind::Unauthorized,
            Self::InvalidData(_) => ExecutionErrorKind::InvalidData,
            Self::Network(_) => ExecutionErrorKind::NetworkError,
            Self::NotFound(_) => ExecutionErrorKind::FundingWalletNotFound,
        }
    }

    pub fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            Self::Network(e.to_string())
        } else if let Some(status) = e.status() {
            if status.as_u16() == 401 || status.as_u16() == 403 {
                Self::Unauthorized(e.to_string())
            } else {
                Self::Network(e.to_string())
            }
        } else {
            Self::Network(e.to_string())
        }
    }
}
