use std::time::Duration;

use log::warn;

use crate::error::ChainError;

/// Exponential backoff on transient network errors, fail-fast on everything
/// else (§4.1). Grounded on the fixed-delay retry loop in the teacher's
/// `notify::send_with_retry`, generalized here to exponential backoff since
/// RPC calls (unlike webhook delivery) can legitimately need many attempts
/// across a flaky provider failover.
pub async fn with_retry<T, F, Fut>(max_attempts: u32, mut call: F) -> Result<T, ChainError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ChainError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err @ ChainError::Network(_)) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(err);
                }
                let delay = Duration::from_millis(200 * 2u64.pow(attempt.min(6)));
                warn!("chain rpc transient error (attempt {attempt}/{max_attempts}): {err}, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
