use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatastoreError;
use crate::postgres::PgDatastore;
use crate::providers::CreditLedgerProvider;

#[async_trait]
impl CreditLedgerProvider for PgDatastore {
    async fn credit(
        &self,
        uid: Uuid,
        asset_on_chain_id: Uuid,
        amount_human: &str,
    ) -> Result<(), DatastoreError> {
        amount_human
            .parse::<rust_decimal::Decimal>()
            .map_err(|e| DatastoreError::Ledger(format!("bad amount_human {amount_human}: {e}")))?;
        sqlx::query(
            "INSERT INTO credit_ledger (uid, asset_on_chain_id, balance_human)
             VALUES ($1, $2, $3::numeric)
             ON CONFLICT (uid, asset_on_chain_id) DO UPDATE SET
                balance_human = credit_ledger.balance_human + EXCLUDED.balance_human",
        )
        .bind(uid)
        .bind(asset_on_chain_id)
        .bind(amount_human)
        .execute(self.pool())
        .await
        .map_err(|e| DatastoreError::Ledger(e.to_string()))?;
        Ok(())
    }
}
