mod advisory_lock;
mod chain;
mod consolidation_queue;
mod control_plane;
mod credit_ledger;
mod deposit;
mod gas_queue;
mod rule;
mod wallet;
mod wallet_balance;
mod withdrawal;

pub use advisory_lock::{AdvisoryLockProvider, EvmFunderLock};
pub use chain::{AssetProvider, ChainCursorProvider, ChainProvider};
pub use consolidation_queue::{ConsolidationQueueProvider, NewConsolidationJob};
pub use control_plane::ControlPlaneProvider;
pub use credit_ledger::CreditLedgerProvider;
pub use deposit::{DepositProvider, NewDeposit};
pub use gas_queue::{GasTopupQueueProvider, NewGasTopupJob};
pub use rule::{RuleLogProvider, RuleProvider};
pub use wallet::{OperationWalletProvider, WalletProvider};
pub use wallet_balance::WalletBalanceProvider;
pub use withdrawal::{NewWithdrawalJob, WithdrawalQueueProvider, WithdrawalRequestProvider};
