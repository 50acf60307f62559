// src/provider/retry.rs — Bounded retries for transient transport failures
//
// Only errors the transport marks retriable (5xx, timeouts, connect
// failures, 429) are retried. When the budget runs out the caller gets
// `RetriesExhausted`, which carries the attempt count into round logs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ModelProvider};
use crate::infra::errors::PromptLoopError;

/// How many times one model call may be attempted, and how long to wait
/// between attempts. Built from the `[provider]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Longest single wait. A rate-limit hint above this ends the call.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Wait before the next attempt, after `failures` failed ones.
    /// `None` when the call should give up instead.
    pub fn next_delay(&self, failures: u32, error: &PromptLoopError) -> Option<Duration> {
        if !error.is_retriable() || failures >= self.max_attempts {
            return None;
        }

        let factor = 1u32.checked_shl(failures.saturating_sub(1)).unwrap_or(u32::MAX);
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);

        match error {
            PromptLoopError::RateLimited { retry_after_ms, .. } => {
                let hint = Duration::from_millis(*retry_after_ms);
                (hint <= self.max_delay).then(|| hint.max(backoff))
            }
            _ => Some(backoff),
        }
    }
}

/// Applies a [`RetryPolicy`] to every call of the wrapped transport.
pub struct RetryProvider {
    inner: Arc<dyn ModelProvider>,
    policy: RetryPolicy,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn ModelProvider>, policy: RetryPolicy) -> Self {
        let policy = RetryPolicy {
            max_attempts: policy.max_attempts.max(1),
            ..policy
        };
        Self { inner, policy }
    }
}

#[async_trait]
impl ModelProvider for RetryProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, PromptLoopError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let error = match self.inner.chat(request.clone()).await {
                Ok(response) => {
                    if attempts > 1 {
                        tracing::info!(provider = self.inner.id(), attempts, "Call recovered");
                    }
                    return Ok(response);
                }
                Err(e) => e,
            };

            let Some(delay) = self.policy.next_delay(attempts, &error) else {
                return Err(if attempts > 1 {
                    PromptLoopError::RetriesExhausted {
                        attempts,
                        last: Box::new(error),
                    }
                } else {
                    error
                });
            };

            tracing::warn!(
                provider = self.inner.id(),
                attempt = attempts,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, retrying: {}",
                error
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TokenUsage;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
        }
    }

    fn unavailable() -> PromptLoopError {
        PromptLoopError::Provider {
            provider: "flaky".into(),
            message: "HTTP 503".into(),
            retriable: true,
        }
    }

    fn rate_limited(retry_after_ms: u64) -> PromptLoopError {
        PromptLoopError::RateLimited {
            provider: "flaky".into(),
            retry_after_ms,
        }
    }

    // ─── Delay schedule ─────────────────────────────────────────

    #[test]
    fn test_backoff_doubles_then_caps() {
        let p = policy(10);
        let delays: Vec<u128> = (1..=6)
            .map(|n| p.next_delay(n, &unavailable()).unwrap().as_millis())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 8, 8]);
    }

    #[test]
    fn test_no_delay_once_budget_spent() {
        assert!(policy(3).next_delay(2, &unavailable()).is_some());
        assert!(policy(3).next_delay(3, &unavailable()).is_none());
        assert!(policy(1).next_delay(1, &unavailable()).is_none());
    }

    #[test]
    fn test_rate_limit_hint_within_cap() {
        let d = policy(5).next_delay(1, &rate_limited(6)).unwrap();
        assert_eq!(d, Duration::from_millis(6));
        // Backoff wins when it is longer than the hint.
        let d = policy(5).next_delay(4, &rate_limited(0)).unwrap();
        assert_eq!(d, Duration::from_millis(8));
    }

    #[test]
    fn test_rate_limit_hint_beyond_cap_gives_up() {
        assert!(policy(5).next_delay(1, &rate_limited(60_000)).is_none());
    }

    #[test]
    fn test_non_retriable_never_delayed() {
        let bad_request = PromptLoopError::Provider {
            provider: "x".into(),
            message: "HTTP 400".into(),
            retriable: false,
        };
        assert!(policy(5).next_delay(1, &bad_request).is_none());
        assert!(policy(5)
            .next_delay(1, &PromptLoopError::JudgementParse("x".into()))
            .is_none());
    }

    #[test]
    fn test_huge_attempt_count_does_not_overflow() {
        let p = RetryPolicy {
            max_attempts: u32::MAX,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(
            p.next_delay(200, &unavailable()),
            Some(Duration::from_secs(30))
        );
    }

    // ─── Wrapper behaviour ──────────────────────────────────────

    /// Fails the first `failures` calls with `error`, then answers "ok".
    struct Flaky {
        failures: u32,
        error: fn() -> PromptLoopError,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, error: fn() -> PromptLoopError) -> Arc<Self> {
            Arc::new(Self {
                failures,
                error,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ModelProvider for Flaky {
        fn id(&self) -> &str {
            "flaky"
        }

        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, PromptLoopError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err((self.error)());
            }
            Ok(ChatResponse {
                content: "ok".into(),
                usage: TokenUsage::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_recovers_within_budget() {
        let inner = Flaky::new(2, unavailable);
        let provider = RetryProvider::new(inner.clone(), policy(3));
        let resp = provider.chat(ChatRequest::default()).await.unwrap();
        assert_eq!(resp.content, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_reports_attempts() {
        let inner = Flaky::new(u32::MAX, unavailable);
        let provider = RetryProvider::new(inner.clone(), policy(3));
        let err = provider.chat(ChatRequest::default()).await.unwrap_err();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            err,
            PromptLoopError::RetriesExhausted { attempts: 3, ref last }
                if last.to_string().contains("503")
        ));
        assert!(err.to_string().contains("after 3 attempts"));
        assert!(err.is_round_failure());
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn test_non_retriable_returned_unwrapped() {
        fn bad_request() -> PromptLoopError {
            PromptLoopError::Provider {
                provider: "flaky".into(),
                message: "HTTP 401".into(),
                retriable: false,
            }
        }
        let inner = Flaky::new(5, bad_request);
        let provider = RetryProvider::new(inner.clone(), policy(4));
        let err = provider.chat(ChatRequest::default()).await.unwrap_err();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, PromptLoopError::Provider { .. }));
    }

    #[tokio::test]
    async fn test_zero_attempts_means_one() {
        let inner = Flaky::new(1, unavailable);
        let provider = RetryProvider::new(inner.clone(), policy(0));
        assert!(provider.chat(ChatRequest::default()).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
