//! Retry/backoff executor
//!
//! Wraps a single provider operation with bounded retry. Failures are
//! classified through the central table in `keyflow-cloud`; fatal
//! classes abort immediately, retryable classes back off and try again
//! up to the attempt cap.

use keyflow_cloud::{classify, ErrorClass};
use std::future::Future;
use std::time::Duration;

/// Retry policy for provider operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,

    /// Base delay; attempt N waits base × N (transient failures)
    pub base_delay: Duration,

    /// Ceiling for any single backoff sleep
    pub max_delay: Duration,

    /// Extra multiplier applied when the provider is rate limiting
    pub rate_limit_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            rate_limit_multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying `attempt` (1-based) after a failure of
    /// the given class.
    fn backoff(&self, attempt: u32, class: ErrorClass) -> Duration {
        let factor = match class {
            ErrorClass::RateLimited => attempt * self.rate_limit_multiplier,
            _ => attempt,
        };
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Terminal failure of one work item in one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Classification of the final error
    pub class: ErrorClass,

    /// Last error message from the provider
    pub message: String,

    /// How many attempts were actually made
    pub attempts: u32,
}

impl ItemFailure {
    pub fn new(class: ErrorClass, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            class,
            message: message.into(),
            attempts,
        }
    }
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} after {} attempt(s): {}",
            self.class, self.attempts, self.message
        )
    }
}

/// Execute `operation` under the retry policy.
///
/// The operation is a factory returning a fresh future per attempt.
/// Fatal classes (permission, invalid argument, already-exists) are
/// returned on the first occurrence; whether already-exists is an error
/// at all is the caller's decision.
pub async fn execute<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    operation: F,
) -> Result<T, ItemFailure>
where
    F: Fn() -> Fut,
    Fut: Future<Output = keyflow_cloud::Result<T>>,
{
    let mut last_message = String::new();
    let mut last_class = ErrorClass::Transient;

    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(op = op_name, attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                let message = err.to_string();
                let class = classify(&message);

                if class.is_fatal() {
                    tracing::debug!(
                        op = op_name,
                        attempt,
                        class = %class,
                        error = %message,
                        "fatal error, not retrying"
                    );
                    return Err(ItemFailure::new(class, message, attempt));
                }

                if attempt < policy.max_attempts {
                    let delay = policy.backoff(attempt, class);
                    tracing::debug!(
                        op = op_name,
                        attempt,
                        class = %class,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "retryable error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }

                last_message = message;
                last_class = class;
            }
        }
    }

    tracing::warn!(
        op = op_name,
        attempts = policy.max_attempts,
        last_class = %last_class,
        error = %last_message,
        "retry attempts exhausted"
    );

    Err(ItemFailure::new(
        ErrorClass::Exhausted,
        last_message,
        policy.max_attempts,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyflow_cloud::CloudError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            rate_limit_multiplier: 2,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = execute(&fast_policy(), "test", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CloudError>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_makes_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = execute(&fast_policy(), "test", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CloudError::CommandFailed(
                    "PERMISSION_DENIED: caller does not have permission".to_string(),
                ))
            }
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.class, ErrorClass::PermissionDenied);
        assert_eq!(failure.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_error_exhausts_attempt_cap() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = execute(&fast_policy(), "test", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CloudError::CommandFailed(
                    "connection reset by peer".to_string(),
                ))
            }
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.class, ErrorClass::Exhausted);
        assert_eq!(failure.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = execute(&fast_policy(), "test", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(CloudError::CommandFailed("timeout talking to API".to_string()))
                } else {
                    Ok("key".to_string())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "key");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_already_exists_surfaces_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = execute(&fast_policy(), "test", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CloudError::CommandFailed(
                    "Requested entity already exists".to_string(),
                ))
            }
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.class, ErrorClass::AlreadyExists);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_scales_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(6),
            rate_limit_multiplier: 2,
        };

        assert_eq!(policy.backoff(1, ErrorClass::Transient), Duration::from_secs(2));
        assert_eq!(policy.backoff(2, ErrorClass::Transient), Duration::from_secs(4));
        // Rate-limited waits twice as long
        assert_eq!(policy.backoff(1, ErrorClass::RateLimited), Duration::from_secs(4));
        // Everything is capped at max_delay
        assert_eq!(policy.backoff(4, ErrorClass::Transient), Duration::from_secs(6));
        assert_eq!(policy.backoff(4, ErrorClass::RateLimited), Duration::from_secs(6));
    }
}
