//! Retry with exponential back-off and jitter for external calls.
//!
//! [`execute`] wraps any fallible async operation and retries on transient
//! failures. The executor carries no domain knowledge: the error type decides
//! its own [`FailureClass`], including a provider-supplied retry hint for
//! rate-limit responses. Non-retryable errors are returned immediately.

use std::future::Future;
use std::time::Duration;

/// How a failed call should be treated by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Not worth retrying; returned to the caller immediately.
    Permanent,
    /// Server-side or transport trouble; retry after exponential back-off.
    Transient,
    /// Explicit rate limiting. The provider's `Retry-After` hint, when
    /// present, takes precedence over the computed delay.
    RateLimited { retry_after: Option<Duration> },
}

/// Implemented by error types that can classify themselves for retry.
pub trait Retryable {
    fn failure_class(&self) -> FailureClass;
}

/// Back-off tuning for [`execute`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Upper bound applied to the final delay, jitter included.
    pub max_delay: Duration,
    pub backoff_multiplier: u32,
    /// Maximum random addition to each delay. Zero disables jitter (tests).
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2,
            jitter: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_app_config(config: &surgecast_core::AppConfig) -> Self {
        Self {
            max_retries: config.retry_max_attempts,
            initial_delay: Duration::from_secs(config.retry_initial_delay_secs),
            max_delay: Duration::from_secs(config.retry_max_delay_secs),
            backoff_multiplier: config.retry_backoff_multiplier,
            jitter: Duration::from_secs(2),
        }
    }
}

/// Runs `operation` with up to `policy.max_retries` additional attempts on
/// transient and rate-limited failures.
///
/// The delay before the n-th retry is `initial_delay × multiplier^(n-1)`,
/// doubled once more for rate limiting without a hint, replaced by the hint
/// when one is present, plus uniform jitter, clamped to `max_delay`.
///
/// # Errors
///
/// Returns the last failure once retries are exhausted, or the first
/// permanent failure immediately.
pub async fn execute<T, E, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let class = err.failure_class();
                if class == FailureClass::Permanent || attempt >= policy.max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay = next_delay(&policy, attempt, class);
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient call failure — retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Compute the sleep before retry number `attempt` (1-based).
fn next_delay(policy: &RetryPolicy, attempt: u32, class: FailureClass) -> Duration {
    let exponential = policy
        .initial_delay
        .saturating_mul(policy.backoff_multiplier.saturating_pow((attempt - 1).min(16)));

    let base = match class {
        FailureClass::RateLimited {
            retry_after: Some(hint),
        } => hint,
        // Rate limiting without a hint backs off harder than plain 5xx.
        FailureClass::RateLimited { retry_after: None } => {
            exponential.saturating_mul(policy.backoff_multiplier)
        }
        _ => exponential,
    };

    let jitter = if policy.jitter.is_zero() {
        Duration::ZERO
    } else {
        policy.jitter.mul_f64(rand::random::<f64>())
    };

    (base + jitter).min(policy.max_delay)
}
