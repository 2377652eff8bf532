use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::debug;

/// First-attempt request timeout; each retry widens it.
const BASE_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(6);
const ATTEMPT_TIMEOUT_STEP: Duration = Duration::from_secs(2);

pub fn backoff_delay(attempt: u32, base_delay: Duration) -> Duration {
    base_delay * 2u32.saturating_pow(attempt)
}

/// Progressive per-attempt timeout: 6s, 8s, 10s, ...
pub fn attempt_timeout(attempt: u32) -> Duration {
    BASE_ATTEMPT_TIMEOUT + ATTEMPT_TIMEOUT_STEP * attempt
}

/// Transient transport failures are worth retrying; anything else
/// (credentials, missing relations) is handed back immediately.
pub fn is_retryable_error(error: &anyhow::Error) -> bool {
    let message = error.to_string().to_lowercase();

    const RETRYABLE_PATTERNS: &[&str] = &[
        "timeout",
        "timed out",
        "network",
        "connect",
        "connection",
        "aborted",
        "unavailable",
        "too many requests",
        "rate limit",
        "error sending request",
    ];

    RETRYABLE_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

/// Runs `operation` under a progressive per-attempt timeout, retrying
/// transient failures with exponential backoff. The timed-out future is
/// dropped, which cancels the underlying request.
pub async fn retry_operation<T, F, Fut>(
    operation_name: &str,
    max_retries: u32,
    base_delay: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = anyhow!("{} was never attempted", operation_name);

    for attempt in 0..=max_retries {
        debug!(
            "{} attempt {}/{}",
            operation_name,
            attempt + 1,
            max_retries + 1
        );

        let timeout = attempt_timeout(attempt);
        match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => {
                debug!("{} succeeded on attempt {}", operation_name, attempt + 1);
                return Ok(value);
            }
            Ok(Err(error)) => {
                if !is_retryable_error(&error) {
                    debug!("{} hit non-retryable error: {}", operation_name, error);
                    return Err(error);
                }
                last_error = error;
            }
            Err(_) => {
                last_error = anyhow!("{} timeout ({:?})", operation_name, timeout);
            }
        }

        if attempt < max_retries {
            let delay = backoff_delay(attempt, base_delay);
            debug!("Retrying {} after {:?}", operation_name, delay);
            tokio::time::sleep(delay).await;
        }
    }

    Err(last_error)
}
