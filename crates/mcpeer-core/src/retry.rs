//! Retry and pagination helpers for explicit user-level operations (C12).
//!
//! These are never invoked automatically for protocol traffic — the core
//! does not retry JSON-RPC requests on the caller's behalf. They exist
//! for embedders that want a
//! convenience wrapper around their own outbound calls (e.g. a client
//! retrying `tools/call` against a flaky server).

use std::future::Future;
use std::time::Duration;

/// A backoff schedule plus a predicate for which errors are worth retrying.
pub trait RetryPolicy: Send + Sync {
    /// The delay to wait before attempt number `attempt` (1-indexed, so
    /// `attempt == 1` is the delay before the *first* retry, after the
    /// initial try already failed).
    fn next_delay(&self, attempt: u32) -> Duration;

    /// Whether `error` should trigger a retry at all. Policies can use
    /// this to avoid retrying e.g. a JSON-RPC `InvalidParams` error, which
    /// will never succeed on retry.
    fn should_retry(&self, error: &dyn std::error::Error) -> bool {
        let _ = error;
        true
    }
}

/// `delay = min(initial * multiplier^(attempt-1), max)`, perturbed by
/// `jitter_factor` so a thundering herd of retrying callers doesn't
/// re-converge on the same instant.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub multiplier: f64,
    pub max: Duration,
    /// Fractional spread applied around the computed delay, e.g. `0.1`
    /// jitters +/-10%. `0.0` disables jitter entirely.
    pub jitter_factor: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            multiplier: 2.0,
            max: Duration::from_secs(30),
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial.as_millis() as f64) * factor;
        let jitter = 1.0 + (fastrand::f64() - 0.5) * 2.0 * self.jitter_factor;
        let jittered_millis = millis * jitter;
        Duration::from_millis(jittered_millis.min(self.max.as_millis() as f64) as u64)
    }
}

/// `delay = min(initial + (attempt-1) * increment, max)`.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    pub initial: Duration,
    pub increment: Duration,
    pub max: Duration,
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            increment: Duration::from_millis(200),
            max: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy for LinearBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let extra = self.increment.saturating_mul(attempt.saturating_sub(1));
        (self.initial + extra).min(self.max)
    }
}

/// Retries `op` up to `max_attempts` times under `policy`, returning the
/// first success or the final error once attempts are exhausted.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut op: F,
    policy: &dyn RetryPolicy,
    max_attempts: u32,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts || !policy.should_retry(&err) {
                    return Err(err);
                }
                tokio::time::sleep(policy.next_delay(attempt)).await;
            }
        }
    }
}

/// Drives a cursor-paginated `page_fn` to completion, concatenating every
/// page's items. `page_fn` returns `(items, next_cursor)`; an empty
/// `next_cursor` ends pagination.
pub async fn list_all<T, E, F, Fut>(mut page_fn: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>), E>>,
{
    let mut items = Vec::new();
    let mut cursor = None;
    loop {
        let (mut page, next_cursor) = page_fn(cursor).await?;
        items.append(&mut page);
        match next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn exponential_backoff_caps_at_max() {
        let policy = ExponentialBackoff {
            initial: Duration::from_millis(100),
            multiplier: 2.0,
            max: Duration::from_millis(500),
            jitter_factor: 0.0,
        };
        assert_eq!(policy.next_delay(1), Duration::from_millis(100));
        assert_eq!(policy.next_delay(2), Duration::from_millis(200));
        assert_eq!(policy.next_delay(3), Duration::from_millis(400));
        assert_eq!(policy.next_delay(4), Duration::from_millis(500));
    }

    #[test]
    fn exponential_backoff_jitter_stays_within_factor() {
        let policy = ExponentialBackoff {
            initial: Duration::from_millis(1000),
            multiplier: 1.0,
            max: Duration::from_secs(10),
            jitter_factor: 0.2,
        };
        for _ in 0..50 {
            let delay = policy.next_delay(1).as_millis();
            assert!((800..=1200).contains(&delay), "delay {delay} outside +/-20% jitter band");
        }
    }

    #[test]
    fn linear_backoff_increments_then_caps() {
        let policy = LinearBackoff {
            initial: Duration::from_millis(100),
            increment: Duration::from_millis(100),
            max: Duration::from_millis(250),
        };
        assert_eq!(policy.next_delay(1), Duration::from_millis(100));
        assert_eq!(policy.next_delay(2), Duration::from_millis(200));
        assert_eq!(policy.next_delay(3), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn retry_returns_first_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();
        let policy = ExponentialBackoff {
            initial: Duration::from_millis(1),
            ..Default::default()
        };
        let result: Result<u32, Boom> = retry_with_backoff(
            move || {
                let a = a.clone();
                async move {
                    let n = a.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 { Err(Boom) } else { Ok(n) }
                }
            },
            &policy,
            5,
        )
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_exhausts_and_returns_final_error() {
        let policy = ExponentialBackoff {
            initial: Duration::from_millis(1),
            ..Default::default()
        };
        let result: Result<u32, Boom> =
            retry_with_backoff(|| async { Err(Boom) }, &policy, 2).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn list_all_concatenates_pages_until_empty_cursor() {
        let pages: Vec<(Vec<i32>, Option<String>)> = vec![
            (vec![1, 2], Some("p2".into())),
            (vec![3, 4], Some("p3".into())),
            (vec![5], None),
        ];
        let pages = Arc::new(std::sync::Mutex::new(pages.into_iter()));
        let result: Result<Vec<i32>, Boom> = list_all(move |_cursor| {
            let pages = pages.clone();
            async move { Ok(pages.lock().unwrap().next().unwrap()) }
        })
        .await;
        assert_eq!(result.unwrap(), vec![1, 2, 3, 4, 5]);
    }
}
