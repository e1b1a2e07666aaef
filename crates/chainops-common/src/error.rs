//! The error-kind taxonomy every execution worker classifies into before deciding
//! whether to retry, fail the job, or wait for an operator.

use chrono::Duration;
use thiserror::Error;

pub const MAX_RETRIES: u32 = 8;

/// One row of `error_message` is always `[kind] message`; `ExecutionErrorKind::tag`
/// is the bracketed part.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionErrorKind {
    #[error("configuration")]
    Configuration,
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid_data")]
    InvalidData,
    #[error("insufficient_balance")]
    InsufficientBalance,
    #[error("tx_reverted")]
    TxReverted,
    #[error("derivation_failed")]
    DerivationFailed,
    #[error("network_error")]
    NetworkError,
    #[error("nonce_error")]
    NonceError,
    #[error("nonce_too_low")]
    NonceTooLow,
    #[error("gas_error")]
    GasError,
    #[error("gas_spike")]
    GasSpike,
    #[error("gas_price_exceeded")]
    GasPriceExceeded,
    #[error("replacement_underpriced")]
    ReplacementUnderpriced,
    #[error("vault_unavailable")]
    VaultUnavailable,
    #[error("signing_failed")]
    SigningFailed,
    #[error("tapos_error")]
    TaposError,
    #[error("funding_wallet_not_found")]
    FundingWalletNotFound,
    #[error("ledger_error")]
    LedgerError,
}

impl ExecutionErrorKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Unauthorized => "unauthorized",
            Self::InvalidData => "invalid_data",
            Self::InsufficientBalance => "insufficient_balance",
            Self::TxReverted => "tx_reverted",
            Self::DerivationFailed => "derivation_failed",
            Self::NetworkError => "network_error",
            Self::NonceError => "nonce_error",
            Self::NonceTooLow => "nonce_too_low",
            Self::GasError => "gas_error",
            Self::GasSpike => "gas_spike",
            Self::GasPriceExceeded => "gas_price_exceeded",
            Self::ReplacementUnderpriced => "replacement_underpriced",
            Self::VaultUnavailable => "vault_unavailable",
            Self::SigningFailed => "signing_failed",
            Self::TaposError => "tapos_error",
            Self::FundingWalletNotFound => "funding_wallet_not_found",
            Self::LedgerError => "ledger_error",
        }
    }

    /// Non-retryable kinds jump straight to `failed`; everything else is retried
    /// up to `MAX_RETRIES` with exponential backoff.
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Configuration
                | Self::Unauthorized
                | Self::InvalidData
                | Self::InsufficientBalance
                | Self::TxReverted
                | Self::DerivationFailed
        )
    }

    /// `min(2^retry_count * 30s, 15min)`.
    pub fn backoff(retry_count: u32) -> Duration {
        let capped_exp = retry_count.min(5); // 2^5 * 30s = 960s already exceeds 15min
        let secs = 30i64.saturating_mul(1i64 << capped_exp);
        Duration::seconds(secs.min(15 * 60))
    }

    pub fn format_message(&self, detail: &str) -> String {
        format!("[{}] {detail}", self.tag())
    }

    /// Whether a job currently at `retry_count` should be retried for this
    /// kind of failure, or should move straight to `failed`.
    pub fn should_retry(&self, retry_count: u32) -> bool {
        self.is_retryable() && retry_count < MAX_RETRIES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds_never_retry() {
        assert!(!ExecutionErrorKind::Unauthorized.is_retryable());
        assert!(!ExecutionErrorKind::DerivationFailed.is_retryable());
        assert!(!ExecutionErrorKind::InvalidData.is_retryable());
    }

    #[test]
    fn retryable_kinds_back_off_exponentially_and_cap_at_15_minutes() {
        assert_eq!(ExecutionErrorKind::backoff(0), Duration::seconds(30));
        assert_eq!(ExecutionErrorKind::backoff(1), Duration::seconds(60));
        assert_eq!(ExecutionErrorKind::backoff(8), Duration::seconds(15 * 60));
    }

    #[test]
    fn should_retry_stops_at_max_retries() {
        assert!(ExecutionErrorKind::NetworkError.should_retry(MAX_RETRIES - 1));
        assert!(!ExecutionErrorKind::NetworkError.should_retry(MAX_RETRIES));
        assert!(!ExecutionErrorKind::InvalidData.should_retry(0));
    }

    #[test]
    fn message_carries_the_bracketed_tag() {
        assert_eq!(
            ExecutionErrorKind::TaposError.format_message("stale refs"),
            "[tapos_error] stale refs"
        );
    }
}
