use std::future::Future;

use rand::Rng;
use serde_json::json;
use tokio::time::{sleep, Duration};

use crate::error::DashError;
use crate::logging::{self, v_str, Domain};

/// Retry configuration
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.3,
        }
    }
}

impl RetryConfig {
    /// Calculate delay with exponential backoff and jitter
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64 * 2.0_f64.powi(attempt as i32);
        let clamped = base.min(self.max_delay_ms as f64);

        // ±jitter_factor of the delay
        let jitter_range = clamped * self.jitter_factor;
        let jitter: f64 = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_delay = (clamped + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }
}

/// Retry an idempotent async operation with exponential backoff.
///
/// Errors that `DashError::is_retryable` rejects are returned immediately.
pub async fn retry_async<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, DashError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DashError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < config.max_retries && e.is_retryable() => {
                let delay = config.delay_for_attempt(attempt);
                logging::warn(
                    Domain::Client,
                    "retry",
                    &[
                        ("operation", v_str(operation_name)),
                        ("attempt", json!(attempt + 1)),
                        ("max_attempts", json!(config.max_retries + 1)),
                        ("error", v_str(&e.to_string())),
                        ("delay_ms", json!(delay.as_millis() as u64)),
                    ],
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Categorize HTTP statuses for retry decisions
pub fn is_retryable_http_error(status: u16) -> bool {
    matches!(status,
        408 |   // Request Timeout
        429 |   // Too Many Requests
        500 |   // Internal Server Error
        502 |   // Bad Gateway
        503 |   // Service Unavailable
        504     // Gateway Timeout
    )
}
