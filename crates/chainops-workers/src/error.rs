//! Shared, non-execution-path error type. Execution workers classify leaf
//! errors directly into `ExecutionErrorKind` to drive retry decisions (§4.8);
//! everything else (detector, confirmation, balance-sync, planner) just needs
//! a single type to log against the execution-log record (§4.3), so those
//! cycles use this instead.

use chainops_chain::ChainError;
use chainops_datastore::DatastoreError;
use chainops_signer::SignerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Datastore(#[from] DatastoreError),
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error("{0}")]
    Other(String),
}
