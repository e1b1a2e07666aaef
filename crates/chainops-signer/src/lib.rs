//! Stateless RPC client for the external signing service (§4.2, §6). The
//! signer custodies key material; this crate never sees a private key.

mod error;

pub use error::SignerError;

use chainops_common::error::ExecutionErrorKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// An abstract transaction the signer turns into a signed, broadcast-ready
/// artifact (§ Glossary "Intent"). Tron intents are broadcast by the signer
/// itself so TAPOS references stay fresh (§4.9).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TronIntent {
    SendTrx {
        from: String,
        to: String,
        amount_sun: String,
    },
    Trc20Transfer {
        from: String,
        to: String,
        amount_sun: String,
        contract_address: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SignPayload {
    TronIntent(TronIntent),
    UnsignedTxHex(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SignRequest {
    pub chain: String,
    pub wallet_group_id: String,
    pub derivation_index: i64,
    #[serde(flatten)]
    pub payload: SignPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignResponse {
    pub signed_tx: Option<String>,
    pub tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignErrorBody {
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct SignerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SignerClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .build()
                .expect("reqwest client builds with static config"),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub async fn sign(
        &self,
        chain: &str,
        wallet_group_id: &str,
        derivation_index: i64,
        payload: SignPayload,
    ) -> Result<SignResponse, SignerError> {
        let request = SignRequest {
            chain: chain.to_string(),
            wallet_group_id: wallet_group_id.to_string(),
            derivation_index,
            payload,
        };

        let response = self
            .http
            .post(format!("{}/sign", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(SignerError::from_transport)?;

        if response.status().is_success() {
            return response
                .json::<SignResponse>()
                .await
                .map_err(|e| SignerError::Network(e.to_string()));
        }

        let status = response.status();
        let body = response
            .json::<SignErrorBody>()
            .await
            .unwrap_or(SignErrorBody {
                error_code: "UNKNOWN".to_string(),
                message: status.to_string(),
            });

        Err(SignerError::from_error_code(&body.error_code, body.message))
    }
}

impl SignerError {
    /// Classification mandated by §4.2: `UNAUTHORIZED`/`DERIVATION_FAILED` are
    /// fatal; `VAULT_UNAVAILABLE`/`SIGNING_FAILED` are retryable; `TAPOS_ERROR`
    /// is retryable and callers must discard any hash it returned.
    pub fn classify(&self) -> ExecutionErrorKind {
        match self {
            Self::Unauthorized(_) => ExecutionErrorKind::Unauthorized,
            Self::DerivationFailed(_) => ExecutionErrorKind::DerivationFailed,
            Self::VaultUnavailable(_) => ExecutionErrorKind::VaultUnavailable,
            Self::SigningFailed(_) => ExecutionErrorKind::SigningFailed,
            Self::TaposError(_) => ExecutionErrorKind::TaposError,
            Self::Network(_) => ExecutionErrorKind::NetworkError,
        }
    }

    /// §4.2: a `TAPOS_ERROR` means the transaction was never accepted on-chain
    /// — any hash in the response must never be persisted.
    pub fn must_discard_hash(&self) -> bool {
        matches!(self, Self::TaposError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tapos_error_is_retryable_and_discards_any_hash() {
        let err = SignerError::TaposError("stale block refs".to_string());
        assert!(err.classify().is_retryable());
        assert!(err.must_discard_hash());
    }

    #[test]
    fn unauthorized_is_fatal() {
        let err = SignerError::Unauthorized("bad api key".to_string());
        assert!(!err.classify().is_retryable());
    }
}
