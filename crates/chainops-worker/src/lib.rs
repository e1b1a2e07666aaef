//! The worker runtime shared by every binary in `chainops-workers` (§4.3):
//! a stable `worker_id`, a heartbeat, maintenance/incident-mode gating
//! consulted once per cycle, graceful shutdown, and the structured
//! execution-log record every cycle writes regardless of outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chainops_common::model::{
    ExecutionLogEntry, ExecutionOutcome, IncidentMode, WorkerState, WorkerStatus,
};
use chainops_common::time::now;
use chainops_datastore::{ControlPlaneProvider, DatastoreError};
use chrono::Duration as ChronoDuration;
use serde_json::Value;
use uuid::Uuid;

/// `worker_id = f"{role}_{chain?}_{pid}_{hostname}"` (§4.3). Hostname comes
/// from the environment rather than a dedicated crate — the process
/// supervisor that launches each worker already sets `HOSTNAME` in every
/// deployment this backplane runs in.
pub fn worker_id(role: &str, chain: Option<&str>) -> String {
    let pid = std::process::id();
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
    match chain {
        Some(chain) => format!("{role}_{chain}_{pid}_{hostname}"),
        None => format!("{role}_{pid}_{hostname}"),
    }
}

/// What a worker should do this cycle, decided by consulting the
/// process-wide control table before any row-mutating work (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Proceed normally.
    Run,
    /// Proceed, but gas-topup specifically must not mutate anything
    /// (`Degraded { degraded_gas_allowed: false }`).
    RunGasPaused,
    /// Maintenance mode or `IncidentMode::Emergency`: skip the cycle entirely.
    Paused,
}

impl Gate {
    pub fn may_run(&self) -> bool {
        !matches!(self, Gate::Paused)
    }

    pub fn gas_topup_allowed(&self) -> bool {
        matches!(self, Gate::Run)
    }
}

/// One running worker process. Cheap to clone (an `Arc`-backed shutdown
/// flag plus a few `String`/`Uuid` fields) so it can be handed to spawned
/// heartbeat tasks without a lifetime fight.
#[derive(Clone)]
pub struct WorkerRuntime {
    worker_id: String,
    role: String,
    chain_id: Option<Uuid>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerRuntime {
    pub fn new(role: impl Into<String>, chain: Option<&str>, chain_id: Option<Uuid>) -> Self {
        let role = role.into();
        Self {
            worker_id: worker_id(&role, chain),
            role,
            chain_id,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Installs `SIGINT`/`SIGTERM` handlers that flip the shutdown flag
    /// rather than terminating the process directly, so the poll loop can
    /// finish its in-flight datastore write and release leases before
    /// exiting (§5 "Cancellation"). Grounded on the teacher's
    /// `AtomicBool`/`Ordering::SeqCst` shutdown flag
    /// (`daemon/src/discovery/server.rs`), generalized from a single
    /// `ctrl_c` wait to also cover `SIGTERM` since these workers run under a
    /// process supervisor that stops them with `SIGTERM`, not `Ctrl+C`.
    pub fn install_signal_handlers(&self) {
        let flag = self.shutdown.clone();
        tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                {
                    Ok(s) => s,
                    Err(e) => {
                        log::warn!("failed to install SIGTERM handler: {e}");
                        let _ = ctrl_c.await;
                        flag.store(true, Ordering::SeqCst);
                        return;
                    }
                };
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = ctrl_c.await;
            }
            flag.store(true, Ordering::SeqCst);
        });
    }

    /// Writes the heartbeat row. Call once per cycle, independent of
    /// whether the cycle did any work (§4.3).
    pub async fn heartbeat(&self, ds: &dyn ControlPlaneProvider) -> Result<(), DatastoreError> {
        ds.heartbeat(&WorkerStatus {
            worker_id: self.worker_id.clone(),
            role: self.role.clone(),
            chain_id: self.chain_id,
            state: if self.is_shutting_down() {
                WorkerState::Stopped
            } else {
                WorkerState::Running
            },
            last_heartbeat: now(),
        })
        .await
    }

    /// Consults `worker_configs` for maintenance mode and incident mode
    /// before any mutating work this cycle (§4.3).
    pub async fn gate(&self, ds: &dyn ControlPlaneProvider) -> Result<Gate, DatastoreError> {
        if ds.is_maintenance_mode().await? {
            return Ok(Gate::Paused);
        }
        let mode = ds.get_incident_mode().await?;
        if mode.mutations_paused() {
            return Ok(Gate::Paused);
        }
        if !mode.gas_topup_allowed() {
            return Ok(Gate::RunGasPaused);
        }
        Ok(Gate::Run)
    }

    /// Writes the execution-log record every cycle produces (§4.3). Takes a
    /// start `Instant` rather than a pre-computed duration so call sites
    /// read as `runtime.record(ds, "deposit_detector", Instant::now(), ...)`
    /// at the top of the cycle and finish the call at the bottom.
    pub async fn record(
        &self,
        ds: &dyn ControlPlaneProvider,
        kind: &str,
        started: Instant,
        status: ExecutionOutcome,
        error: Option<String>,
        metadata: Option<Value>,
    ) -> Result<(), DatastoreError> {
        let entry = ExecutionLogEntry {
            worker_id: self.worker_id.clone(),
            kind: kind.to_string(),
            status,
            duration_ms: started.elapsed().as_millis() as i64,
            error,
            metadata,
        };
        ds.record_execution(&entry).await
    }

    /// Best-effort lease cleanup attempted on shutdown (§5). Workers that
    /// hold no lease of their own (e.g. the detector, which only owns the
    /// chain cursor) pass an empty release future.
    pub async fn shutdown(&self, ds: &dyn ControlPlaneProvider) -> Result<(), DatastoreError> {
        ds.mark_stopped(&self.worker_id).await
    }
}

/// Default lease TTL applied by every lease-acquiring worker unless a
/// specific cycle needs a different one.
pub fn default_lease_ttl() -> ChronoDuration {
    ChronoDuration::minutes(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_id_embeds_role_pid_and_chain() {
        let id = worker_id("balance_sync", None);
        assert!(id.starts_with("balance_sync_"));
        let id = worker_id("gas_topup_executor", Some("bsc"));
        assert!(id.starts_with("gas_topup_executor_bsc_"));
    }

    #[test]
    fn gate_may_run_and_gas_allowed() {
        assert!(Gate::Run.may_run());
        assert!(Gate::Run.gas_topup_allowed());
        assert!(Gate::RunGasPaused.may_run());
        assert!(!Gate::RunGasPaused.gas_topup_allowed());
        assert!(!Gate::Paused.may_run());
    }
}
