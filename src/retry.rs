use std::future::Future;

use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::{DispatchError, FetchError};

/// Failure classes that earn another attempt under a [`RetryPolicy`].
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        FetchError::is_transient(self)
    }
}

impl Transient for DispatchError {
    fn is_transient(&self) -> bool {
        DispatchError::is_transient(self)
    }
}

/// Run `op` until it succeeds, a non-transient error occurs, or the policy's
/// attempt budget runs out. Returns the last error either way; the caller
/// wraps the exhausted case into its own terminal variant.
pub async fn with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    context: &'static str,
    mut op: F,
) -> Result<T, (E, u32)>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    context,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err((err, attempt + 1)),
        }
    }
}
