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
