//! Retry helper: bounded exponential backoff with jitter.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Retry budget and backoff shape (`[retry]` config section).
///
/// Attempt `n` (from zero) waits `base_delay_ms * 2^n` plus up to
/// `jitter_ms` of random jitter, capped at `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt `attempt`, with `jitter` in `[0, 1)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, jitter: f64) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let jitter = (self.jitter_ms as f64 * jitter.clamp(0.0, 1.0)) as u64;
        Duration::from_millis(exponential.saturating_add(jitter).min(self.max_delay_ms))
    }
}

/// Why a retried operation gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    #[error("non-retryable failure")]
    Fatal(#[source] E),
}

impl<E> RetryError<E> {
    /// The error returned by the last attempt.
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } | Self::Fatal(last) => last,
        }
    }
}

/// Run `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or the policy's attempts are used up.
///
/// # Errors
///
/// Returns [`RetryError::Fatal`] for a non-retryable failure and
/// [`RetryError::Exhausted`] once every attempt failed.
pub async fn retry<T, E, Op, Fut, C>(
    policy: &RetryPolicy,
    is_retryable: C,
    mut operation: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable(&err) => return Err(RetryError::Fatal(err)),
            Err(err) if attempt + 1 >= attempts => {
                tracing::error!(attempts, error = %err, "giving up");
                return Err(RetryError::Exhausted { attempts, last: err });
            }
            Err(err) => {
                let delay = policy.delay_for(attempt, rand::thread_rng().r#gen::<f64>());
                tracing::warn!(
                    attempt = attempt + 1,
                    attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
