//! The relational datastore surface: one provider trait per concern, unified
//! by the `Datastore` supertrait, so every worker depends on a single
//! object-safe abstraction regardless of which rows it touches.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod providers;

pub use error::DatastoreError;
pub use providers::*;

/// Everything a worker may need from the datastore. Grounded on the
/// teacher's `Storage: ProviderA + ProviderB + ...` composition — one trait
/// per table family, unioned here rather than one god-trait per operation.
pub trait Datastore:
    ChainProvider
    + AssetProvider
    + ChainCursorProvider
    + WalletProvider
    + OperationWalletProvider
    + WalletBalanceProvider
    + DepositProvider
    + ConsolidationQueueProvider
    + GasTopupQueueProvider
    + WithdrawalRequestProvider
    + WithdrawalQueueProvider
    + RuleProvider
    + RuleLogProvider
    + ControlPlaneProvider
    + CreditLedgerProvider
    + AdvisoryLockProvider
    + Send
    + Sync
    + 'static
{
}

impl<T> Datastore for T where
    T: ChainProvider
        + AssetProvider
        + ChainCursorProvider
        + WalletProvider
        + OperationWalletProvider
        + WalletBalanceProvider
        + DepositProvider
        + ConsolidationQueueProvider
        + GasTopupQueueProvider
        + WithdrawalRequestProvider
        + WithdrawalQueueProvider
        + RuleProvider
        + RuleLogProvider
        + ControlPlaneProvider
        + CreditLedgerProvider
        + AdvisoryLockProvider
        + Send
        + Sync
        + 'static
{
}
