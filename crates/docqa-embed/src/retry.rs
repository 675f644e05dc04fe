use std::future::Future;
use std::time::Duration;

use docqa_core::config::EmbeddingSettings;
use docqa_core::EmbeddingError;
use rand::Rng;
use tracing::warn;

use crate::rate_limit::{Lane, RateLimiter};

/// Bounded retry for calls against the rate-limited backend.
///
/// - throttled: widen the lane interval, then exponential backoff with jitter
/// - other transient failures: fixed short backoff
/// - permanent failures: returned immediately
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub transient_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&EmbeddingSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            backoff_base: Duration::from_millis(settings.backoff_base_ms),
            backoff_max: Duration::from_millis(settings.backoff_max_ms),
            transient_backoff: Duration::from_millis(settings.transient_backoff_ms),
        }
    }

    /// `base * 2^attempt` capped at `backoff_max`, plus up to `base` of jitter.
    pub fn throttle_delay(&self, attempt: u32) -> Duration {
        let exp = self.backoff_base.saturating_mul(2u32.saturating_pow(attempt)).min(self.backoff_max);
        let base_ms = u64::try_from(self.backoff_base.as_millis()).unwrap_or(u64::MAX);
        let jitter = if base_ms == 0 { 0 } else { rand::thread_rng().gen_range(0..base_ms) };
        exp + Duration::from_millis(jitter)
    }

    /// Run `op` once per attempt, each attempt first passing through the limiter.
    pub async fn run<T, F, Fut>(&self, limiter: &RateLimiter, lane: Lane, mut op: F) -> Result<T, EmbeddingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EmbeddingError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            limiter.acquire(lane).await;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_permanent() => return Err(err),
                Err(err) => err,
            };
            if err.is_throttled() {
                limiter.on_throttled(lane);
            }
            if attempt >= self.max_retries {
                return Err(EmbeddingError::Exhausted { attempts: attempt + 1, last: Box::new(err) });
            }
            let delay = if err.is_throttled() { self.throttle_delay(attempt) } else { self.transient_backoff };
            warn!("{lane:?} call failed (attempt {}/{}): {err}; retrying in {delay:?}", attempt + 1, self.max_retries + 1);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_millis(1_000),
            transient_backoff: Duration::from_millis(50),
        }
    }

    #[test]
    fn throttle_delay_grows_and_caps() {
        let p = policy();
        let d0 = p.throttle_delay(0);
        assert!(d0 >= Duration::from_millis(100) && d0 < Duration::from_millis(200));
        let d2 = p.throttle_delay(2);
        assert!(d2 >= Duration::from_millis(400) && d2 < Duration::from_millis(500));
        let d9 = p.throttle_delay(9);
        assert!(d9 >= Duration::from_millis(1_000) && d9 < Duration::from_millis(1_100));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let rl = RateLimiter::unlimited();
        let res: Result<(), _> = policy()
            .run(&rl, Lane::Embedding, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(EmbeddingError::Auth("401".into())) }
            })
            .await;
        assert!(matches!(res, Err(EmbeddingError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_exhaust_after_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let rl = RateLimiter::unlimited();
        let res: Result<(), _> = policy()
            .run(&rl, Lane::Embedding, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(EmbeddingError::Transient("502".into())) }
            })
            .await;
        match res {
            Err(EmbeddingError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*last, EmbeddingError::Transient(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn throttling_widens_interval_then_succeeds() {
        let calls = AtomicU32::new(0);
        let cfg = crate::rate_limit::LaneConfig {
            interval: Duration::from_millis(200),
            ceiling: Duration::from_millis(5_000),
        };
        let rl = RateLimiter::new(cfg, cfg);
        let res = policy()
            .run(&rl, Lane::Embedding, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(EmbeddingError::RateLimited("429".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(res.unwrap(), 2);
        assert_eq!(rl.interval(Lane::Embedding), Duration::from_millis(800));
        assert_eq!(rl.interval(Lane::Chat), Duration::from_millis(200));
    }
}
