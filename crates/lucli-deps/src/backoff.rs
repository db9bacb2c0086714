//! Bounded exponential backoff for network-sourced dependency fetches (spec
//! §4.7: "Network failures are retried with bounded exponential backoff").

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl BackoffPolicy {
    /// Delay before attempt `attempt` (0-indexed: the first retry is attempt 1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        let scaled = self.base.saturating_mul(factor);
        scaled.min(self.max_delay)
    }

    /// Run `f` up to `max_attempts` times, sleeping between attempts
    /// according to the policy. Returns the first success or the final
    /// error.
    pub fn retry<T, E>(&self, mut f: impl FnMut() -> Result<T, E>) -> Result<T, E> {
        let mut attempt = 0;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    std::thread::sleep(self.delay_for(attempt));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially() {
        let policy = BackoffPolicy::default();
        assert!(policy.delay_for(1) < policy.delay_for(2));
        assert!(policy.delay_for(2) < policy.delay_for(3));
    }

    #[test]
    fn delay_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(30), policy.max_delay);
    }

    #[test]
    fn retry_returns_first_success() {
        let policy = BackoffPolicy {
            max_attempts: 3,
            base: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let mut calls = 0;
        let result: Result<i32, &str> = policy.retry(|| {
            calls += 1;
            if calls < 2 {
                Err("not yet")
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 2);
    }

    #[test]
    fn retry_gives_up_after_max_attempts() {
        let policy = BackoffPolicy {
            max_attempts: 3,
            base: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let mut calls = 0;
        let result: Result<i32, &str> = policy.retry(|| {
            calls += 1;
            Err("always fails")
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
