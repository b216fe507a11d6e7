use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::RunnerError;

/// Runs a detail fetch up to `attempts` times, `delay` apart.
pub(crate) async fn retry_detail_fetch<T, F, Fut>(
    what: &str,
    attempts: usize,
    delay: Duration,
    mut operation: F,
) -> Result<T, RunnerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RunnerError>>,
{
    let max_attempts = attempts.max(1);
    let mut attempt = 0usize;
    loop {
        attempt = attempt.saturating_add(1);
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < max_attempts => {
                warn!(what, attempt, %error, "detail fetch failed; retrying");
                sleep_retry_delay(delay).await;
            }
            Err(error) => {
                return Err(RunnerError::DetailFetchExhausted {
                    what: what.to_string(),
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }
        }
    }
}

async fn sleep_retry_delay(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    tokio::time::sleep(delay).await;
}
