pub mod chain;
pub mod deposit;
pub mod queue;
pub mod rule;
pub mod wallet;
pub mod worker;

pub use chain::{Asset, AssetOnChain, Chain, ChainFamily};
pub use deposit::{ChainCursor, Deposit, DepositStatus, ObservedTransfer};
pub use queue::{
    ConsolidationJob, ExecutionStatus, GasTopupJob, QueueKind, RuleKind, RuleLogEntry,
    WithdrawalJob, WithdrawalRequest, WithdrawalRequestStatus,
};
pub use rule::{ConsolidationRule, GasTopupRule};
pub use wallet::{
    Lease, OperationRole, OperationWalletAddress, Priority, ProcessingStatus, UserWalletAddress,
    WalletAddress, WalletBalance,
};
pub use worker::{ExecutionLogEntry, ExecutionOutcome, IncidentMode, WorkerState, WorkerStatus};
