//! Retrying generation calls that fail transiently.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use docsight_types::{DocsightError, Result};

use crate::{GenerationRequest, TextGenerator};

/// Wait between two attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffPolicy {
    /// Retry immediately. Provider hints are ignored.
    None,
    Fixed(Duration),
    /// `initial`, doubled after every failed attempt, never above `cap`.
    Exponential { initial: Duration, cap: Duration },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            initial: Duration::from_secs(1),
            cap: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    /// Wait after the `failures`-th consecutive failure (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        match self {
            BackoffPolicy::None => Duration::ZERO,
            BackoffPolicy::Fixed(wait) => *wait,
            BackoffPolicy::Exponential { initial, cap } => {
                let factor = 1u32.checked_shl(failures.saturating_sub(1)).unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(*cap)
            }
        }
    }

    /// Like [`delay`](Self::delay), but a rate limit's `retry_after` hint is
    /// honored when it asks for a longer wait.
    fn wait_after(&self, failures: u32, error: &DocsightError) -> Duration {
        let planned = self.delay(failures);
        match (self, error) {
            (BackoffPolicy::None, _) => planned,
            (_, DocsightError::RateLimited { retry_after_ms, .. }) => {
                planned.max(Duration::from_millis(*retry_after_ms))
            }
            _ => planned,
        }
    }
}

/// Run `call` until it succeeds, fails with a non-retryable error, or has
/// been tried `max_attempts` times. `max_attempts` below 1 counts as 1.
pub async fn execute_with_retry<T, F, Fut>(
    call: F,
    max_attempts: usize,
    policy: &BackoffPolicy,
    label: &str,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut failures: u32 = 0;
    loop {
        let error = match call().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        failures = failures.saturating_add(1);
        if !error.is_retryable() || failures as usize >= max_attempts {
            if failures > 1 {
                tracing::warn!(call = %label, attempts = failures, error = %error, "Giving up");
            }
            return Err(error);
        }
        let wait = policy.wait_after(failures, &error);
        tracing::warn!(
            call = %label,
            attempt = failures,
            wait_ms = wait.as_millis() as u64,
            error = %error,
            "Transient failure, retrying"
        );
        tokio::time::sleep(wait).await;
    }
}

// ---------------------------------------------------------------------------
// RetryingGenerator
// ---------------------------------------------------------------------------

/// A [`TextGenerator`] that retries its inner generator.
pub struct RetryingGenerator<G> {
    inner: G,
    max_attempts: usize,
    policy: BackoffPolicy,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, max_attempts: usize) -> Self {
        Self {
            inner,
            max_attempts,
            policy: BackoffPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let label = self.inner.name();
        execute_with_retry(
            || self.inner.generate(request),
            self.max_attempts,
            &self.policy,
            label,
        )
        .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Generator failing with `error()` for its first `failures` calls.
    struct Scripted {
        calls: Arc<AtomicUsize>,
        failures: usize,
        error: fn() -> DocsightError,
    }

    impl Scripted {
        fn new(failures: usize, error: fn() -> DocsightError) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let generator = Self {
                calls: calls.clone(),
                failures,
                error,
            };
            (generator, calls)
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(format!("answer after {n} failures"))
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn busy() -> DocsightError {
        DocsightError::ProviderError {
            provider: "test".into(),
            status: 503,
            message: "busy".into(),
            retryable: true,
        }
    }

    fn throttled() -> DocsightError {
        DocsightError::RateLimited {
            provider: "test".into(),
            retry_after_ms: 700,
        }
    }

    fn unauthorized() -> DocsightError {
        DocsightError::AuthError {
            provider: "test".into(),
        }
    }

    async fn run(generator: Scripted, attempts: usize) -> Result<String> {
        RetryingGenerator::new(generator, attempts)
            .with_policy(BackoffPolicy::None)
            .generate(&GenerationRequest::new("q"))
            .await
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let (generator, calls) = Scripted::new(2, busy);
        let out = run(generator, 3).await.unwrap();
        assert_eq!(out, "answer after 2 failures");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn last_error_returned_when_attempts_run_out() {
        let (generator, calls) = Scripted::new(10, throttled);
        let err = run(generator, 3).await.unwrap_err();
        assert!(matches!(err, DocsightError::RateLimited { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auth_errors_are_not_retried() {
        let (generator, calls) = Scripted::new(10, unauthorized);
        let err = run(generator, 5).await.unwrap_err();
        assert!(matches!(err, DocsightError::AuthError { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_calls_once() {
        let (generator, calls) = Scripted::new(0, busy);
        assert!(run(generator, 0).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn plain_closures_can_be_retried() {
        let out = execute_with_retry(|| async { Ok::<_, DocsightError>(7) }, 2, &BackoffPolicy::None, "n")
            .await
            .unwrap();
        assert_eq!(out, 7);
    }

    #[test]
    fn exponential_delay_doubles_up_to_cap() {
        let policy = BackoffPolicy::Exponential {
            initial: Duration::from_millis(100),
            cap: Duration::from_millis(500),
        };
        let waits: Vec<u128> = (1..=5).map(|n| policy.delay(n).as_millis()).collect();
        assert_eq!(waits, vec![100, 200, 400, 500, 500]);
        assert_eq!(policy.delay(200), Duration::from_millis(500));
    }

    #[test]
    fn rate_limit_hint_lengthens_wait() {
        let fixed = BackoffPolicy::Fixed(Duration::from_millis(50));
        assert_eq!(fixed.wait_after(1, &throttled()), Duration::from_millis(700));
        assert_eq!(fixed.wait_after(1, &busy()), Duration::from_millis(50));
        assert_eq!(BackoffPolicy::None.wait_after(1, &throttled()), Duration::ZERO);
    }
}
