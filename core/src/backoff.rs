//! Retry with exponential backoff for startup bootstrap calls.
//!
//! Poll cycles never go through here: a failed cycle is retried by the next
//! tick, not by looping inside it.

use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use std::time::Duration;
use tracing::{debug, warn};

pub fn create_backoff(base_delay_ms: u64) -> ExponentialBackoff<backoff::SystemClock> {
    ExponentialBackoff {
        current_interval: Duration::from_millis(base_delay_ms),
        initial_interval: Duration::from_millis(base_delay_ms),
        randomization_factor: 0.5,
        multiplier: 2.0,
        max_interval: Duration::from_secs(60),
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    }
}

/// Runs `operation` until it succeeds, `max_attempts` is reached, or it
/// fails with an error `retryable` rejects.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    operation: F,
    retryable: R,
    max_attempts: u32,
    base_delay_ms: u64,
    operation_name: &str,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut backoff = create_backoff(base_delay_ms);
    let mut attempts = 0;

    loop {
        attempts += 1;

        let e = match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(
                        operation = operation_name,
                        attempts, "Operation succeeded after retries"
                    );
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        if !retryable(&e) || attempts >= max_attempts.max(1) {
            warn!(
                operation = operation_name,
                attempts,
                error = %e,
                "Operation failed, giving up"
            );
            return Err(e);
        }

        match backoff.next_backoff() {
            Some(duration) => {
                warn!(
                    operation = operation_name,
                    attempt = attempts,
                    retry_after_ms = duration.as_millis() as u64,
                    error = %e,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(duration).await;
            }
            None => return Err(e),
        }
    }
}
