use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatastoreError;

/// The server-side `credit(uid, asset_id, amount_human)` procedure (§3,
/// §9). Exactly-once is provided by the caller via `credited_at`, not by
/// this call being idempotent on its own.
#[async_trait]
pub trait CreditLedgerProvider {
    async fn credit(
        &self,
        uid: Uuid,
        asset_on_chain_id: Uuid,
        amount_human: &str,
    ) -> Result<(), DatastoreError>;
}
