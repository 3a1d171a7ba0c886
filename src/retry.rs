//! Generic retry-with-backoff abstraction (spec §9 design note).
//!
//! Every stage that retries (S2 transcription, S4 translation batches, S5
//! per-segment TTS, S6 per-segment stretch) goes through this single
//! `retry` function parameterized by a [`RetryPolicy`] rather than
//! inlining backoff loops at each call site.

use std::future::Future;
use std::time::Duration;

use crate::error::DubError;

/// `{attempts, backoff, retryable_predicate}` as named in spec §9.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Vec<Duration>,
    /// Called with the most recent error; returning `false` aborts retries
    /// immediately even if attempts remain (e.g. a 4xx provider error).
    pub retryable: fn(&DubError) -> bool,
}

impl RetryPolicy {
    /// S2 transcription retry policy: 3 attempts, 2s/4s/8s backoff.
    pub fn transcription() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ],
            retryable: DubError::is_retryable,
        }
    }

    /// S4 translation batch retry policy for rate limits: 3 attempts,
    /// 5s/10s/20s backoff.
    pub fn translation_rate_limited() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(20),
            ],
            retryable: DubError::is_retryable,
        }
    }

    /// S4 translation batch retry policy for 5xx errors: 3 attempts,
    /// 2s/4s/8s backoff. No retry is performed on 4xx (non-retryable).
    pub fn translation_server_error() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ],
            retryable: DubError::is_retryable,
        }
    }

    /// S5 per-segment TTS retry policy: 3 attempts, 2s/4s/8s backoff.
    pub fn synthesis() -> Self {
        Self::transcription()
    }

    /// S6 per-segment stretch retry policy: single attempt, no backoff —
    /// stretch failures fall back to the unstretched clip instead of
    /// retrying (spec §4.1 S6 policy).
    pub fn stretch() -> Self {
        Self {
            max_attempts: 1,
            backoff: vec![],
            retryable: |_| false,
        }
    }
}

/// Run `op`, retrying per `policy`. Every `tokio::time::sleep` between
/// attempts is a cooperative suspension point (spec §5).
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, DubError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DubError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                let exhausted = attempt >= policy.max_attempts;
                let retryable = (policy.retryable)(&err);
                if exhausted || !retryable {
                    return Err(err);
                }
                let delay = policy
                    .backoff
                    .get((attempt - 1) as usize)
                    .copied()
                    .unwrap_or_else(|| policy.backoff.last().copied().unwrap_or_default());
                tracing::warn!(attempt, ?delay, error = %err, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
