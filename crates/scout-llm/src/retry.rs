use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

const BASE_BACKOFF_SECS: u64 = 1;

/// Parse the `Retry-After` header value as seconds, falling back to exponential backoff.
pub(crate) fn retry_delay(response: &reqwest::Response, attempt: u32) -> Duration {
    if let Some(val) = response.headers().get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.parse::<u64>()
    {
        return Duration::from_secs(secs);
    }
    Duration::from_secs(BASE_BACKOFF_SECS << attempt.min(16))
}

/// Send an HTTP request, retrying up to `max_retries` times on 429 responses.
///
/// `f` must return a `reqwest::Response`. Returns the successful `Response` for
/// further processing by the caller, or an error.
///
/// # Errors
///
/// Returns `LlmError::RateLimited` if all attempts are exhausted, or the underlying
/// `reqwest::Error` wrapped as `LlmError::Http` for other failures.
pub(crate) async fn send_with_retry<F, Fut>(
    provider_name: &str,
    max_retries: u32,
    mut f: F,
) -> Result<reqwest::Response, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..=max_retries {
        let response = f().await.map_err(LlmError::Http)?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if attempt == max_retries {
                return Err(LlmError::RateLimited);
            }
            let delay = retry_delay(&response, attempt);
            tracing::warn!(
                "{provider_name} rate limited, retrying in {}s ({}/{})",
                delay.as_secs(),
                attempt + 1,
                max_retries
            );
            tokio::time::sleep(delay).await;
            continue;
        }

        return Ok(response);
    }

    Err(LlmError::RateLimited)
}

/// Timeout and retry budget for a single provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Upper bound for one attempt.
    pub timeout: Duration,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            timeout: Duration::from_secs(30),
            base_backoff: Duration::from_secs(BASE_BACKOFF_SECS),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(1_u32 << attempt.min(16))
    }
}

/// Run `f` under `policy`: every attempt is bounded by `policy.timeout`, and
/// retryable failures are retried with exponential backoff.
///
/// # Errors
///
/// Returns the last error once the retry budget is spent, or the first
/// non-retryable error immediately.
pub async fn call_with_retry<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    mut f: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, f()).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                after: policy.timeout,
            }),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries && e.is_retryable() => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    "{label} failed: {e}, retrying in {}ms ({}/{})",
                    delay.as_millis(),
                    attempt + 1,
                    policy.max_retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
