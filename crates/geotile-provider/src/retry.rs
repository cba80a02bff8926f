//! Bounded retry with exponential backoff and jitter for tile fetches.

use std::time::Duration;

use rand::Rng;

/// Retry configuration for a single tile request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt. Default: 2.
    pub max_retries: u32,
    /// Delay before the first retry. Default: 250 ms.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry. Default: 2.0.
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay. Default: 5 s.
    pub max_delay: Duration,
    /// Jitter factor (0.0–1.0), applied as ±jitter to each delay. Default: 0.25.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(250),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

/// Tracks retries made so far and computes the next backoff delay.
pub struct RetryState {
    policy: RetryPolicy,
    retries: u32,
    current_delay: Duration,
}

impl RetryState {
    /// Start a fresh retry sequence.
    pub fn new(policy: RetryPolicy) -> Self {
        let initial = policy.initial_delay;
        Self {
            policy,
            retries: 0,
            current_delay: initial,
        }
    }

    /// Compute the next delay and advance the retry counter.
    /// Returns `None` once `max_retries` have been used.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.policy.max_retries {
            return None;
        }

        let base = self.current_delay;
        self.retries += 1;

        let jittered = if self.policy.jitter > 0.0 {
            let mut rng = rand::rng();
            let factor = rng.random_range((1.0 - self.policy.jitter)..=(1.0 + self.policy.jitter));
            base.mul_f64(factor)
        } else {
            base
        };

        let next = self.current_delay.mul_f64(self.policy.backoff_multiplier);
        self.current_delay = next.min(self.policy.max_delay);

        Some(jittered.min(self.policy.max_delay))
    }

    /// Retries used so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

/// Outcome of [`retry_with_backoff`].
#[derive(Debug)]
pub enum Attempted<T, E> {
    /// An attempt succeeded.
    Succeeded {
        /// Produced value.
        value: T,
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed, or the last error was not worth retrying.
    Failed {
        /// Error from the last attempt.
        error: E,
        /// Attempts made.
        attempts: u32,
    },
    /// Cancellation was observed before an attempt started.
    Cancelled,
}

/// Run `op` until it succeeds, retries run out, `should_retry` rejects an
/// error, or `is_cancelled` reports true. Sleeps the calling thread between
/// attempts.
pub fn retry_with_backoff<T, E>(
    policy: &RetryPolicy,
    mut is_cancelled: impl FnMut() -> bool,
    mut should_retry: impl FnMut(&E) -> bool,
    mut op: impl FnMut(u32) -> Result<T, E>,
) -> Attempted<T, E> {
    let mut state = RetryState::new(policy.clone());
    let mut attempts = 0;
    loop {
        if is_cancelled() {
            return Attempted::Cancelled;
        }
        attempts += 1;
        match op(attempts) {
            Ok(value) => return Attempted::Succeeded { value, attempts },
            Err(error) => {
                if !should_retry(&error) {
                    return Attempted::Failed { error, attempts };
                }
                match state.next_delay() {
                    Some(delay) => std::thread::sleep(delay),
                    None => return Attempted::Failed { error, attempts },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::ZERO,
            jitter: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_delays_grow_and_cap() {
        let mut state = RetryState::new(RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(300),
            jitter: 0.0,
        });
        assert_eq!(state.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(state.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(state.next_delay(), Some(Duration::from_millis(300)));
        assert_eq!(state.next_delay(), Some(Duration::from_millis(300)));
        assert_eq!(state.retries(), 4);
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let mut state = RetryState::new(instant_policy(1));
        assert!(state.next_delay().is_some());
        assert!(state.next_delay().is_none());
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            max_retries: 50,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 1.0,
            jitter: 0.25,
            ..Default::default()
        };
        let mut state = RetryState::new(policy);
        while let Some(delay) = state.next_delay() {
            assert!(delay >= Duration::from_millis(74));
            assert!(delay <= Duration::from_millis(126));
        }
    }

    #[test]
    fn test_retry_succeeds_after_transient_failures() {
        let outcome = retry_with_backoff(
            &instant_policy(3),
            || false,
            |_: &&'static str| true,
            |attempt| if attempt < 3 { Err("flaky") } else { Ok(attempt) },
        );
        assert!(matches!(outcome, Attempted::Succeeded { value: 3, attempts: 3 }));
    }

    #[test]
    fn test_retry_gives_up_after_max_retries() {
        let mut calls = 0;
        let outcome = retry_with_backoff(
            &instant_policy(2),
            || false,
            |_: &&'static str| true,
            |_| -> Result<(), &'static str> {
                calls += 1;
                Err("down")
            },
        );
        assert!(matches!(outcome, Attempted::Failed { attempts: 3, .. }));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_permanent_error_is_not_retried() {
        let outcome = retry_with_backoff(
            &instant_policy(5),
            || false,
            |_: &&'static str| false,
            |_| -> Result<(), &'static str> { Err("404") },
        );
        assert!(matches!(outcome, Attempted::Failed { attempts: 1, .. }));
    }

    #[test]
    fn test_cancellation_before_first_attempt() {
        let outcome: Attempted<(), ()> =
            retry_with_backoff(&instant_policy(5), || true, |_| true, |_| Ok(()));
        assert!(matches!(outcome, Attempted::Cancelled));
    }
}
