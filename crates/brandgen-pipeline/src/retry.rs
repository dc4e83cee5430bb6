//! Rate-limit aware retry controller
//!
//! Wraps a single generation call. Only an explicit rate-limit signal from
//! the service is retried; every other failure is terminal on the spot.

use brandgen_core::{BrandgenError, Result};
use std::fmt;
use std::time::Duration;

/// What one attempt produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome<T> {
    /// A well-formed success
    Ready(T),
    /// The service asked us to back off (carries its error code)
    RateLimited(String),
}

/// Controller state, reported in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting,
    RateLimited,
    Succeeded,
    Exhausted,
}

impl fmt::Display for RetryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryState::Attempting => write!(f, "attempting"),
            RetryState::RateLimited => write!(f, "rate-limited"),
            RetryState::Succeeded => write!(f, "succeeded"),
            RetryState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Blocking pause between attempts and between jobs
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Exponential backoff: wait `base_delay * 2^attempt` after the attempt-th
/// rate limit, giving up once `max_retries` retries have been spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Total requests this policy may issue
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after the rate limit seen on `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Drive `op` until it succeeds, fails, or the retry budget runs out.
    /// `op` receives the 0-based attempt number.
    pub fn run<T, F>(&self, sleeper: &dyn Sleeper, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<AttemptOutcome<T>>,
    {
        let mut attempt = 0u32;
        loop {
            tracing::trace!(attempt, state = %RetryState::Attempting);
            match op(attempt)? {
                AttemptOutcome::Ready(value) => {
                    tracing::debug!(attempt, state = %RetryState::Succeeded);
                    return Ok(value);
                }
                AttemptOutcome::RateLimited(code) if attempt >= self.max_retries => {
                    tracing::warn!(attempt, %code, state = %RetryState::Exhausted, "giving up");
                    return Err(BrandgenError::RateLimitExceeded {
                        attempts: attempt + 1,
                    });
                }
                AttemptOutcome::RateLimited(code) => {
                    let wait = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        %code,
                        state = %RetryState::RateLimited,
                        wait_secs = wait.as_secs(),
                        "rate limited, backing off"
                    );
                    print!(" rate-limited, waiting {}s...", wait.as_secs());
                    sleeper.sleep(wait);
                    attempt += 1;
                }
            }
        }
    }
}

/// Records requested pauses instead of sleeping
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    pub(crate) pauses: std::cell::RefCell<Vec<Duration>>,
}

#[cfg(test)]
impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.pauses.borrow_mut().push(duration);
    }
}
