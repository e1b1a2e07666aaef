use async_trait::async_trait;
use chainops_common::model::{ConsolidationRule, GasTopupRule, RuleKind, RuleLogEntry};
use uuid::Uuid;

use crate::error::DatastoreError;
use crate::postgres::rows::{consolidation_rule_from_row, gas_rule_from_row};
use crate::postgres::PgDatastore;
use crate::providers::{RuleLogProvider, RuleProvider};

#[async_trait]
impl RuleProvider for PgDatastore {
    async fn list_active_gas_rules(
        &self,
        chain_id: Uuid,
        gas_asset_on_chain_id: Uuid,
    ) -> Result<Vec<GasTopupRule>, DatastoreError> {
        let rows = sqlx::query(
            "SELECT * FROM gas_topup_rules
             WHERE chain_id = $1 AND gas_asset_on_chain_id = $2 AND is_active = true",
        )
        .bind(chain_id)
        .bind(gas_asset_on_chain_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(gas_rule_from_row).collect()
    }

    async fn list_active_consolidation_rules(
        &self,
        chain_id: Uuid,
        asset_on_chain_id: Uuid,
    ) -> Result<Vec<ConsolidationRule>, DatastoreError> {
        let rows = sqlx::query(
            "SELECT * FROM consolidation_rules
             WHERE chain_id = $1 AND asset_on_chain_id = $2 AND is_active = true
             ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'normal' THEN 1 WHEN 'low' THEN 2 ELSE 3 END",
        )
        .bind(chain_id)
        .bind(asset_on_chain_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(consolidation_rule_from_row).collect()
    }
}

fn rule_kind_str(k: RuleKind) -> &'static str {
    match k {
        RuleKind::GasTopup => "gas_topup",
        RuleKind::Consolidation => "consolidation",
    }
}

#[async_trait]
impl RuleLogProvider for PgDatastore {
    async fn append(&self, entry: RuleLogEntry) -> Result<(), DatastoreError> {
        sqlx::query(
            "INSERT INTO rule_logs
                (id, kind, rule_id, wallet_balance_id, matched, detail, evaluated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entry.id)
        .bind(rule_kind_str(entry.kind))
        .bind(entry.rule_id)
        .bind(entry.wallet_balance_id)
        .bind(entry.matched)
        .bind(&entry.detail)
        .bind(entry.evaluated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
