//! Bounded retry with a fixed backoff around transient engine failures.

use std::time::Duration;

use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::{ImpselectError, ImpselectResult};

/// Blocking wait between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
///
/// Without a policy `op` runs exactly once. With one, only
/// [`ImpselectError::is_retryable`] failures are retried; each is followed
/// by `policy.backoff()` unless it was the last attempt, in which case it
/// surfaces as [`ImpselectError::RetriesExhausted`]. `op` receives the
/// 1-based attempt number.
pub fn run_with_retry<T, F>(
    policy: Option<&RetryPolicy>,
    sleeper: &dyn Sleeper,
    mut op: F,
) -> ImpselectResult<T>
where
    F: FnMut(u32) -> ImpselectResult<T>,
{
    let Some(policy) = policy else {
        return op(1);
    };

    let max_attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(ImpselectError::Engine(e)) if e.is_retryable() => {
                if attempt >= max_attempts {
                    warn!(
                        error = %e,
                        attempts = attempt,
                        "transient engine failure, no attempts left"
                    );
                    return Err(ImpselectError::RetriesExhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    backoff_secs = policy.timeout,
                    "transient engine failure, retrying after backoff"
                );
                sleeper.sleep(policy.backoff());
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
