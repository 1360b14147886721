//! Bounded retry with exponential backoff for transient storage errors.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use keepsake_types::error::RepositoryError;

const BASE_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(1);
const MAX_ATTEMPTS: u32 = 3;

/// Run a storage operation, retrying transient failures with exponential
/// backoff (100ms base, doubling, capped at 1s, 3 attempts total).
///
/// Only errors reporting `is_transient()` are retried; everything else
/// surfaces immediately. A spent retry budget surfaces as
/// [`RepositoryError::Exhausted`].
pub async fn with_backoff<T, F, Fut>(operation: &str, mut run: F) -> Result<T, RepositoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RepositoryError>>,
{
    let mut delay = BASE_DELAY;
    let mut attempt = 1u32;
    loop {
        match run().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < MAX_ATTEMPTS => {
                warn!(%error, operation, attempt, "transient storage error, retrying");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                attempt += 1;
            }
            Err(error) if error.is_transient() => {
                return Err(RepositoryError::Exhausted {
                    attempts: MAX_ATTEMPTS,
                    last: error.to_string(),
                });
            }
            Err(error) => return Err(error),
        }
    }
}
