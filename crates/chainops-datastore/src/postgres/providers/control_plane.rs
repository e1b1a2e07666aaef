use async_trait::async_trait;
use chainops_common::model::{
    ExecutionLogEntry, ExecutionOutcome, IncidentMode, WorkerState, WorkerStatus,
};
use uuid::Uuid;

use crate::error::DatastoreError;
use crate::postgres::PgDatastore;
use crate::providers::ControlPlaneProvider;

fn worker_state_str(s: WorkerState) -> &'static str {
    match s {
        WorkerState::Starting => "starting",
        WorkerState::Running => "running",
        WorkerState::Stopped => "stopped",
    }
}

fn execution_outcome_str(s: ExecutionOutcome) -> &'static str {
    match s {
        ExecutionOutcome::Success => "success",
        ExecutionOutcome::Fail => "fail",
        ExecutionOutcome::Skip => "skip",
    }
}

#[async_trait]
impl ControlPlaneProvider for PgDatastore {
    async fn heartbeat(&self, status: &WorkerStatus) -> Result<(), DatastoreError> {
        sqlx::query(
            "INSERT INTO worker_status (worker_id, role, chain_id, state, last_heartbeat)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (worker_id) DO UPDATE SET
                role = EXCLUDED.role,
                chain_id = EXCLUDED.chain_id,
                state = EXCLUDED.state,
                last_heartbeat = EXCLUDED.last_heartbeat",
        )
        .bind(&status.worker_id)
        .bind(&status.role)
        .bind(status.chain_id)
        .bind(worker_state_str(status.state))
        .bind(status.last_heartbeat)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn mark_stopped(&self, worker_id: &str) -> Result<(), DatastoreError> {
        sqlx::query("UPDATE worker_status SET state = 'stopped' WHERE worker_id = $1")
            .bind(worker_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn get_incident_mode(&self) -> Result<IncidentMode, DatastoreError> {
        let row = sqlx::query("SELECT value FROM worker_configs WHERE key = 'incident_mode'")
            .fetch_optional(self.pool())
            .await?;
        let Some(row) = row else {
            return Ok(IncidentMode::Normal);
        };
        let value: serde_json::Value = sqlx::Row::try_get(&row, "value")
            .map_err(|e| DatastoreError::InvalidData(format!("value: {e}")))?;
        serde_json::from_value(value)
            .map_err(|e| DatastoreError::InvalidData(format!("incident_mode: {e}")))
    }

    async fn is_maintenance_mode(&self) -> Result<bool, DatastoreError> {
        let row = sqlx::query("SELECT value FROM worker_configs WHERE key = 'maintenance'")
            .fetch_optional(self.pool())
            .await?;
        let Some(row) = row else {
            return Ok(false);
        };
        let value: serde_json::Value = sqlx::Row::try_get(&row, "value")
            .map_err(|e| DatastoreError::InvalidData(format!("value: {e}")))?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn record_execution(&self, entry: &ExecutionLogEntry) -> Result<(), DatastoreError> {
        sqlx::query(
            "INSERT INTO worker_executions
                (id, worker_id, type, status, duration_ms, error, metadata, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, now())",
        )
        .bind(Uuid::new_v4())
        .bind(&entry.worker_id)
        .bind(&entry.kind)
        .bind(execution_outcome_str(entry.status))
        .bind(entry.duration_ms)
        .bind(&entry.error)
        .bind(&entry.metadata)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
