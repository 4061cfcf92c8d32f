//! Exponential backoff for outbound dials.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use skychat_shared::constants::{DIAL_BACKOFF_FACTOR, DIAL_BASE_DELAY_MS, DIAL_MAX_ATTEMPTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub factor: u32,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DIAL_BASE_DELAY_MS),
            factor: DIAL_BACKOFF_FACTOR,
            max_attempts: DIAL_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(self.factor.max(1).saturating_pow(exp))
    }

    /// Run `op` until it succeeds or `max_attempts` is used up. On failure
    /// returns the number of attempts made and the last error.
    pub async fn run<F, Fut, T, E>(&self, mut op: F) -> Result<T, (u32, E)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) if attempt >= max_attempts => return Err((attempt, e)),
                Err(_) => sleep(self.delay_after(attempt)).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(50));
        assert_eq!(policy.delay_after(2), Duration::from_millis(100));
        assert_eq!(policy.delay_after(3), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            factor: 2,
            max_attempts: 3,
        };
        let mut calls = 0;
        let result: Result<(), (u32, &str)> = policy
            .run(|_| {
                calls += 1;
                async { Err("refused") }
            })
            .await;
        assert_eq!(result, Err((3, "refused")));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_succeeds_on_later_attempt() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            factor: 2,
            max_attempts: 5,
        };
        let result: Result<u32, (u32, ())> = policy
            .run(|attempt| async move { if attempt < 3 { Err(()) } else { Ok(attempt) } })
            .await;
        assert_eq!(result, Ok(3));
    }
}
