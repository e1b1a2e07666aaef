//! The three execution-worker families (§4.8-§4.10), each split into a
//! Tron-intent cycle and an EVM build-sign-broadcast cycle.

pub mod common;
pub mod consolidation;
pub mod gas_topup;
pub mod withdrawal;
