//! Stateful retry executor keyed by resource and operation

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use profilecache_common::Clock;
use tracing::{debug, trace};

use super::error::{RetryError, RetryResult};

/// Attempt budget and backoff curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Attempts allowed before the executor refuses
    pub max_attempts: u32,
    /// Wait after the first failure
    pub base_delay: Duration,
    /// Upper bound for any wait
    pub max_backoff: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    /// Wait required after `failures` consecutive failures:
    /// `min(base_delay * 2^(failures - 1), max_backoff)`
    pub fn delay_after(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Failure history for one `(key, operation)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempts: u32,
    pub last_attempt_at: Option<Instant>,
    /// Minimum gap between `last_attempt_at` and the next attempt
    pub backoff: Duration,
}

impl RetryState {
    fn fresh(policy: &BackoffPolicy) -> Self {
        Self { attempts: 0, last_attempt_at: None, backoff: policy.base_delay }
    }

    /// Time still to wait at `now` before another attempt may start
    pub fn remaining_backoff(&self, now: Instant) -> Duration {
        match self.last_attempt_at {
            Some(last) => self.backoff.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

type StateKey = (String, String);

/// Runs one attempt at a time under a per-key backoff budget
///
/// State survives between calls, so the backoff applies across callers:
/// whoever makes the next attempt for a key waits out the window left by the
/// previous failure. A success deletes the state.
///
/// # Example
/// ```
/// use std::sync::Arc;
///
/// use profilecache_common::MockClock;
/// use profilecache_core::{BackoffPolicy, RetryError, RetryExecutor};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let retry = RetryExecutor::new(Arc::new(MockClock::new()), BackoffPolicy::default());
///
/// let first = retry.run("u1", "fetch", || async { Err::<(), _>("down") }).await;
/// assert!(matches!(first, Err(RetryError::AttemptFailed { attempt: 1, .. })));
///
/// let second = retry.run("u1", "fetch", || async { Ok::<_, &str>(7) }).await;
/// assert_eq!(second.ok(), Some(7));
/// assert!(retry.state("u1", "fetch").is_none());
/// # }
/// ```
pub struct RetryExecutor {
    clock: Arc<dyn Clock>,
    policy: BackoffPolicy,
    states: Mutex<HashMap<StateKey, RetryState>>,
}

impl RetryExecutor {
    /// Create an executor with no recorded failures
    pub fn new(clock: Arc<dyn Clock>, policy: BackoffPolicy) -> Self {
        Self { clock, policy, states: Mutex::new(HashMap::new()) }
    }

    /// The policy this executor enforces
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Make one attempt of `operation` for `(key, op_name)`
    ///
    /// Returns [`RetryError::AttemptsExhausted`] without calling `operation`
    /// when the budget is spent. Otherwise sleeps out any remaining backoff,
    /// runs the operation once, and records the outcome.
    pub async fn run<T, E, F, Fut>(&self, key: &str, op_name: &str, operation: F) -> RetryResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let state = self.load(key, op_name);
        if state.attempts >= self.policy.max_attempts {
            trace!(key, op_name, attempts = state.attempts, "retry budget exhausted");
            return Err(RetryError::AttemptsExhausted { attempts: state.attempts });
        }

        let wait = state.remaining_backoff(self.clock.now());
        if !wait.is_zero() {
            debug!(key, op_name, wait_ms = wait.as_millis() as u64, "waiting out backoff");
            self.clock.sleep(wait).await;
        }

        match operation().await {
            Ok(value) => {
                self.reset(key, op_name);
                Ok(value)
            }
            Err(source) => {
                let attempt = self.record_failure(key, op_name);
                debug!(key, op_name, attempt, max_attempts = self.policy.max_attempts, "attempt failed");
                Err(RetryError::AttemptFailed {
                    attempt,
                    max_attempts: self.policy.max_attempts,
                    source,
                })
            }
        }
    }

    /// Forget the state for `(key, op_name)`
    pub fn reset(&self, key: &str, op_name: &str) {
        self.states.lock().remove(&(key.to_string(), op_name.to_string()));
    }

    /// Forget the state of every operation for `key`
    pub fn forget_key(&self, key: &str) -> usize {
        let mut states = self.states.lock();
        let before = states.len();
        states.retain(|(k, _), _| k != key);
        before - states.len()
    }

    /// Drop states whose last attempt is more than `idle` before `now`
    pub fn sweep_idle(&self, now: Instant, idle: Duration) -> usize {
        let mut states = self.states.lock();
        let before = states.len();
        states.retain(|_, state| match state.last_attempt_at {
            Some(last) => now.saturating_duration_since(last) <= idle,
            None => false,
        });
        before - states.len()
    }

    /// Current state for `(key, op_name)`, if any failure is recorded
    pub fn state(&self, key: &str, op_name: &str) -> Option<RetryState> {
        self.states.lock().get(&(key.to_string(), op_name.to_string())).copied()
    }

    /// Number of tracked `(key, operation)` pairs
    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    /// Whether no state is tracked
    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }

    /// Forget everything
    pub fn clear(&self) {
        self.states.lock().clear();
    }

    fn load(&self, key: &str, op_name: &str) -> RetryState {
        self.state(key, op_name).unwrap_or_else(|| RetryState::fresh(&self.policy))
    }

    fn record_failure(&self, key: &str, op_name: &str) -> u32 {
        let now = self.clock.now();
        let mut states = self.states.lock();
        let state = states
            .entry((key.to_string(), op_name.to_string()))
            .or_insert_with(|| RetryState::fresh(&self.policy));

        state.attempts = (state.attempts + 1).min(self.policy.max_attempts);
        state.last_attempt_at = Some(now);
        state.backoff = state.backoff.max(self.policy.delay_after(state.attempts));
        state.attempts
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("tracked", &self.states.lock().len())
            .finish()
    }
}
