use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Read from `worker_configs` once per cycle (§4.3). In `Degraded`, gas-topup
/// may additionally be disabled by `gas_allowed = false`; in `Emergency`, all
/// mutating workers pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum IncidentMode {
    Normal,
    Degraded { degraded_gas_allowed: bool },
    Emergency,
}

impl Default for IncidentMode {
    fn default() -> Self {
        Self::Normal
    }
}

impl IncidentMode {
    pub fn mutations_paused(&self) -> bool {
        matches!(self, Self::Emergency)
    }

    pub fn gas_topup_allowed(&self) -> bool {
        match self {
            Self::Normal => true,
            Self::Degraded { degraded_gas_allowed } => *degraded_gas_allowed,
            Self::Emergency => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Starting,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub worker_id: String,
    pub role: String,
    pub chain_id: Option<uuid::Uuid>,
    pub state: WorkerState,
    pub last_heartbeat: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionOutcome {
    Success,
    Fail,
    Skip,
}

/// One row written per worker cycle (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub worker_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ExecutionOutcome,
    pub duration_ms: i64,
    pub error: Option<String>,
    pub metadata: Option<Value>,
}
