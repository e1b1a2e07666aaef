use async_trait::async_trait;
use chainops_common::model::{ExecutionLogEntry, IncidentMode, WorkerStatus};

use crate::error::DatastoreError;

/// `worker_status`, `worker_executions`, `worker_configs` (§6, §4.3).
#[async_trait]
pub trait ControlPlaneProvider {
    async fn heartbeat(&self, status: &WorkerStatus) -> Result<(), DatastoreError>;

    async fn mark_stopped(&self, worker_id: &str) -> Result<(), DatastoreError>;

    async fn get_incident_mode(&self) -> Result<IncidentMode, DatastoreError>;

    async fn is_maintenance_mode(&self) -> Result<bool, DatastoreError>;

    async fn record_execution(&self, entry: &ExecutionLogEntry) -> Result<(), DatastoreError>;
}
