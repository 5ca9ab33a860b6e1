//! Time abstraction for testability
//!
//! Provides a trait-based approach to time operations that allows TTL and
//! backoff logic to run against either real time or a manually driven clock.
//! The trait covers both reading time (`now`) and suspending (`sleep`), so a
//! component that waits out a backoff window can be tested without real
//! delays.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use profilecache_common::time::{Clock, MockClock};
//!
//! let mock = MockClock::new();
//! let start = mock.now();
//! mock.advance(Duration::from_secs(5));
//! assert_eq!(mock.now().duration_since(start), Duration::from_secs(5));
//! ```

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Notify;

/// Trait for time operations to enable deterministic testing
///
/// Every component that makes a decision based on elapsed time (entry expiry,
/// retry throttling, periodic sweeps) reads time and sleeps through this
/// trait and never through `std::time` or `tokio::time` directly.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by the tokio time driver
///
/// `now()` reads the tokio clock, so a runtime started with paused time
/// (`#[tokio::test(start_paused = true)]`) sees the same virtual time for
/// both expiry checks and sleeps. Outside a paused runtime this is plain
/// monotonic time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Implement Clock for Arc<T> where T: Clock for convenient sharing
#[async_trait]
impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// How a [`MockClock`] treats `sleep`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SleepMode {
    /// `sleep(d)` advances the clock by `d` itself
    AutoAdvance,
    /// `sleep(d)` parks until `advance`/`set_elapsed` reach the deadline
    Manual,
}

/// Mock clock for deterministic testing
///
/// Time only moves when a test calls [`MockClock::advance`] or when code
/// under test sleeps. The default clock auto-advances: `sleep(d)` moves the
/// virtual time forward by `d` and yields once to the scheduler instead of
/// waiting, which suits code that sleeps a bounded number of times (retry
/// backoff). A [`MockClock::manual`] clock never moves by itself: `sleep`
/// parks until the test advances past the deadline, which suits loops that
/// sleep forever (the janitor).
///
/// Every requested sleep is recorded and can be inspected with
/// [`MockClock::sleeps`]. Clones share the same timeline.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    base_system_time: SystemTime,
    mode: SleepMode,
    elapsed: Arc<Mutex<Duration>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
    moved: Arc<Notify>,
}

impl MockClock {
    /// Create an auto-advancing mock clock starting at the current instant
    pub fn new() -> Self {
        Self::with_current_time(Instant::now())
    }

    /// Create an auto-advancing mock clock with a specific start instant
    pub fn with_current_time(start: Instant) -> Self {
        Self::build(start, SleepMode::AutoAdvance)
    }

    /// Create a mock clock whose sleeps wait for the test to advance it
    pub fn manual() -> Self {
        Self::build(Instant::now(), SleepMode::Manual)
    }

    fn build(start: Instant, mode: SleepMode) -> Self {
        Self {
            start,
            base_system_time: SystemTime::now(),
            mode,
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
            moved: Arc::new(Notify::new()),
        }
    }

    /// Whether `sleep` parks until the clock is advanced
    pub fn is_manual(&self) -> bool {
        self.mode == SleepMode::Manual
    }

    /// Advance the mock clock by a duration, waking sleepers whose deadline
    /// has passed
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += duration;
        }
        self.moved.notify_waiters();
    }

    /// Advance the mock clock by milliseconds (convenience method)
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed = duration;
        }
        self.moved.notify_waiters();
    }

    /// Get the virtual time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|e| *e).unwrap_or(Duration::ZERO)
    }

    /// Durations passed to `sleep`, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    async fn wait_until(&self, deadline: Duration) {
        loop {
            // Register before checking so an advance in between is not lost
            let moved = self.moved.notified();
            tokio::pin!(moved);
            moved.as_mut().enable();

            if self.elapsed() >= deadline {
                return;
            }
            moved.await;
        }
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.base_system_time + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        match self.mode {
            SleepMode::AutoAdvance => {
                self.advance(duration);
                tokio::task::yield_now().await;
            }
            SleepMode::Manual => self.wait_until(self.elapsed() + duration).await,
        }
    }
}
