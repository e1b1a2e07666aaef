//! Shared plumbing for the six execution-worker cycles (§4.8-§4.10): failure
//! classification, the Tron intent-broadcast call, and the EVM per-funder
//! build-sign-broadcast state machine. Each queue (gas-topup, consolidation,
//! withdrawal) keeps its own `run_*_cycle` entry points in a sibling module —
//! the three queues share no row-level state, so duplicating the thin
//! candidate loop around these helpers reads clearer than a generic
//! `Queueish` abstraction would.

use chainops_chain::evm;
use chainops_chain::{ChainError, EvmAdapter};
use chainops_common::error::ExecutionErrorKind;
use chainops_datastore::{AdvisoryLockProvider, DatastoreError};
use chainops_signer::{SignPayload, SignerClient, SignerError, TronIntent};
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use std::str::FromStr;

/// A plain TRX/native-value transfer's gas limit; kept distinct from the
/// ERC-20 limit below so callers never have to guess which one a job needs.
pub const NATIVE_TRANSFER_GAS_LIMIT: u64 = 21_000;
pub const ERC20_TRANSFER_GAS_LIMIT: u64 = 90_000;

/// In-cycle RPC-race retries (replacement-underpriced bump, nonce refetch)
/// before the job is bounced back to the queue for the next pick (§4.10).
const MAX_BROADCAST_ATTEMPTS: u32 = 3;

/// A leaf chain/signer/datastore error, already classified into the taxonomy
/// every execution worker's retry decision is driven by.
#[derive(Debug)]
pub struct ExecutionFailure {
    pub kind: ExecutionErrorKind,
    pub detail: String,
}

impl ExecutionFailure {
    pub fn new(kind: ExecutionErrorKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }
}

impl From<ChainError> for ExecutionFailure {
    fn from(e: ChainError) -> Self {
        Self { kind: e.classify(), detail: e.to_string() }
    }
}

impl From<SignerError> for ExecutionFailure {
    fn from(e: SignerError) -> Self {
        Self { kind: e.classify(), detail: e.to_string() }
    }
}

impl From<DatastoreError> for ExecutionFailure {
    fn from(e: DatastoreError) -> Self {
        Self { kind: ExecutionErrorKind::LedgerError, detail: e.to_string() }
    }
}

/// What a queue's `mark_retry`/`mark_failed` call should do with a failed
/// attempt, per the retry table in §4.8.
pub enum FailureAction {
    Retry { scheduled_at: DateTime<Utc>, error_message: String },
    Fail { error_message: String },
}

/// `max_retries` lets a withdrawal job's own per-request cap override the
/// taxonomy's global `MAX_RETRIES` (§4.8); gas-topup and consolidation jobs
/// just pass the global constant through.
pub fn classify_failure(failure: &ExecutionFailure, retry_count: u32, max_retries: u32) -> FailureAction {
    let error_message = failure.kind.format_message(&failure.detail);
    let retryable = failure.kind.is_retryable() && retry_count < max_retries;
    if retryable {
        FailureAction::Retry {
            scheduled_at: Utc::now() + ExecutionErrorKind::backoff(retry_count),
            error_message,
        }
    } else {
        FailureAction::Fail { error_message }
    }
}

/// Signs and broadcasts a Tron intent. The signer fetches TAPOS references
/// and broadcasts itself (§4.9); on any error (including `TAPOS_ERROR`) no
/// `SignResponse` is ever produced, so there is no hash to discard — the
/// idempotency guard `must_discard_hash()` is automatically honored by the
/// fact that an `Err` here never reaches a caller's `mark_broadcast`.
pub async fn broadcast_tron_intent(
    signer: &SignerClient,
    chain_name: &str,
    wallet_group_id: &str,
    derivation_index: i64,
    intent: TronIntent,
) -> Result<String, ExecutionFailure> {
    let response = signer
        .sign(chain_name, wallet_group_id, derivation_index, SignPayload::TronIntent(intent))
        .await?;
    response.tx_hash.ok_or_else(|| {
        ExecutionFailure::new(ExecutionErrorKind::SigningFailed, "signer returned no tx_hash")
    })
}

/// The parameters of one EVM send, already resolved to on-chain shapes
/// (decimals applied, calldata built) by the caller.
pub struct EvmSendParams {
    pub from: String,
    pub to: String,
    pub value_wei: String,
    pub data: Vec<u8>,
    pub gas_limit: u64,
}

/// Build-sign-broadcast under a held per-funder advisory lock (§4.10): the
/// live `eth_chainId` is checked against the chain's configured id first, the
/// lock is acquired for the whole nonce-fetch-through-broadcast window, and
/// is always released before returning regardless of outcome.
pub async fn send_evm_transaction(
    ds: &dyn AdvisoryLockProvider,
    adapter: &EvmAdapter,
    signer: &SignerClient,
    chain_name: &str,
    wallet_group_id: &str,
    derivation_index: i64,
    configured_chain_id: Option<u64>,
    gas_price_cap_gwei: u64,
    params: EvmSendParams,
) -> Result<String, ExecutionFailure> {
    let chain_id = match configured_chain_id {
        Some(expected) => {
            let live = adapter.fetch_chain_id().await?;
            if live != expected {
                return Err(ExecutionFailure::new(
                    ExecutionErrorKind::Configuration,
                    format!("rpc reports chain id {live}, configured chain id is {expected}"),
                ));
            }
            expected
        }
        // No configured id to check the RPC against (§3 allows it to be
        // absent); fall back to whatever the RPC itself reports.
        None => adapter.fetch_chain_id().await?,
    };

    let lock = ds.lock_evm_funder(&params.from.to_lowercase()).await?;
    let result = send_evm_transaction_locked(
        adapter,
        signer,
        chain_name,
        wallet_group_id,
        derivation_index,
        chain_id,
        gas_price_cap_gwei,
        &params,
    )
    .await;
    lock.unlock().await?;
    result
}

async fn send_evm_transaction_locked(
    adapter: &EvmAdapter,
    signer: &SignerClient,
    chain_name: &str,
    wallet_group_id: &str,
    derivation_index: i64,
    chain_id: u64,
    gas_price_cap_gwei: u64,
    params: &EvmSendParams,
) -> Result<String, ExecutionFailure> {
    let cap_wei = BigUint::from(gas_price_cap_gwei) * BigUint::from(1_000_000_000u64);

    let mut nonce = adapter.pending_nonce(&params.from).await?;
    let mut gas_price = adapter.fee_data_gas_price().await?;
    ensure_under_cap(&gas_price, &cap_wei, ExecutionErrorKind::GasSpike)?;

    for _attempt in 0..MAX_BROADCAST_ATTEMPTS {
        let unsigned = evm::build_unsigned_legacy_tx(
            nonce,
            &gas_price,
            params.gas_limit,
            &params.to,
            &params.value_wei,
            &params.data,
            chain_id,
        )?;

        let response = signer
            .sign(chain_name, wallet_group_id, derivation_index, SignPayload::UnsignedTxHex(unsigned))
            .await?;
        let signed = response.signed_tx.ok_or_else(|| {
            ExecutionFailure::new(ExecutionErrorKind::SigningFailed, "signer returned no signed_tx")
        })?;

        match adapter.send_raw_transaction(&signed).await {
            Ok(tx_hash) => return Ok(tx_hash),
            Err(e) => {
                let message = e.to_string().to_lowercase();
                if message.contains("replacement") && message.contains("underpriced") {
                    let bumped = evm::bump_gas_price(&gas_price)?;
                    ensure_under_cap(&bumped, &cap_wei, ExecutionErrorKind::GasPriceExceeded)?;
                    gas_price = bumped;
                    continue;
                }
                if message.contains("nonce too low") || message.contains("already known") {
                    nonce = adapter.pending_nonce(&params.from).await?;
                    continue;
                }
                return Err(e.into());
            }
        }
    }

    Err(ExecutionFailure::new(
        ExecutionErrorKind::NetworkError,
        "exhausted in-cycle broadcast retries on nonce/gas-price races",
    ))
}

/// `kind` distinguishes the two callers (§4.10/§7): the initial pre-broadcast
/// fee-data check is a `gas_spike` (nothing has been attempted yet), while
/// the post-bump check after a replacement-underpriced retry is
/// `gas_price_exceeded`.
fn ensure_under_cap(gas_price_wei: &str, cap_wei: &BigUint, kind: ExecutionErrorKind) -> Result<(), ExecutionFailure> {
    let price = BigUint::from_str(gas_price_wei).map_err(|_| {
        ExecutionFailure::new(ExecutionErrorKind::InvalidData, format!("invalid gas price: {gas_price_wei}"))
    })?;
    if &price > cap_wei {
        return Err(ExecutionFailure::new(kind, format!("gas price {gas_price_wei} exceeds the configured cap")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_price_under_the_cap_passes() {
        let cap = BigUint::from(100_000_000_000u64);
        assert!(ensure_under_cap("50000000000", &cap, ExecutionErrorKind::GasSpike).is_ok());
    }

    #[test]
    fn gas_price_over_the_cap_is_rejected_as_a_gas_spike_on_the_initial_check() {
        let cap = BigUint::from(100_000_000_000u64);
        let err = ensure_under_cap("200000000000", &cap, ExecutionErrorKind::GasSpike).unwrap_err();
        assert_eq!(err.kind, ExecutionErrorKind::GasSpike);
    }

    #[test]
    fn gas_price_over_the_cap_is_rejected_as_gas_price_exceeded_on_the_post_bump_check() {
        let cap = BigUint::from(100_000_000_000u64);
        let err = ensure_under_cap("200000000000", &cap, ExecutionErrorKind::GasPriceExceeded).unwrap_err();
        assert_eq!(err.kind, ExecutionErrorKind::GasPriceExceeded);
    }

    #[test]
    fn a_retryable_kind_under_max_retries_schedules_a_retry() {
        let failure = ExecutionFailure::new(ExecutionErrorKind::NetworkError, "timeout");
        match classify_failure(&failure, 0, chainops_common::error::MAX_RETRIES) {
            FailureAction::Retry { error_message, .. } => {
                assert!(error_message.starts_with("[network_error]"));
            }
            FailureAction::Fail { .. } => panic!("expected a retry"),
        }
    }

    #[test]
    fn a_retryable_kind_past_max_retries_fails_instead() {
        let failure = ExecutionFailure::new(ExecutionErrorKind::NetworkError, "timeout");
        match classify_failure(&failure, chainops_common::error::MAX_RETRIES, chainops_common::error::MAX_RETRIES) {
            FailureAction::Fail { error_message } => {
                assert!(error_message.starts_with("[network_error]"));
            }
            FailureAction::Retry { .. } => panic!("expected a terminal failure past the retry cap"),
        }
    }

    #[test]
    fn a_non_retryable_kind_fails_immediately_on_the_first_attempt() {
        let failure = ExecutionFailure::new(ExecutionErrorKind::InsufficientBalance, "not enough funds");
        match classify_failure(&failure, 0, chainops_common::error::MAX_RETRIES) {
            FailureAction::Fail { error_message } => {
                assert!(error_message.starts_with("[insufficient_balance]"));
            }
            FailureAction::Retry { .. } => panic!("insufficient_balance must never retry"),
        }
    }
}
