use thiserror::Error;

/// Signer error taxonomy (§4.2, §6 `error_body.error_code`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("signer rejected request: unauthorized ({0})")]
    Unauthorized(String),

    #[error("signer could not derive key: {0}")]
    DerivationFailed(String),

    #[error("signer vault unavailable: {0}")]
    VaultUnavailable(String),

    #[error("signer failed to sign: {0}")]
    SigningFailed(String),

    #[error("tron TAPOS references expired: {0}")]
    TaposError(String),

    #[error("network error talking to signer: {0}")]
    Network(String),
}

impl SignerError {
    pub fn from_transport(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }

    pub fn from_error_code(code: &str, message: String) -> Self {
        match code {
            "UNAUTHORIZED" => Self::Unauthorized(message),
            "DERIVATION_FAILED" => Self::DerivationFailed(message),
            "VAULT_UNAVAILABLE" => Self::VaultUnavailable(message),
            "SIGNING_FAILED" => Self::SigningFailed(message),
            "TAPOS_ERROR" => Self::TaposError(message),
            _ => Self::Network(format!("unknown error_code {code}: {message}")),
        }
    }
}
