use async_trait::async_trait;

use crate::error::DatastoreError;

/// Held session-scoped advisory lock. The EVM execution worker keeps this
/// alive across the whole build-sign-broadcast phase and unlocks it in its
/// cleanup path (§4.10).
#[async_trait]
pub trait EvmFunderLock: Send {
    async fn unlock(self: Box<Self>) -> Result<(), DatastoreError>;
}

/// `lock_evm_funder(key)` / `unlock_evm_funder(key)` using
/// `hashtext(key)` (§6).
#[async_trait]
pub trait AdvisoryLockProvider {
    async fn lock_evm_funder(&self, key: &str) -> Result<Box<dyn EvmFunderLock>, DatastoreError>;
}
