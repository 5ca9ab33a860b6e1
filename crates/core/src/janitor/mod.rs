//! Background sweeping of expired cache state.
//!
//! Lazy expiry only removes entries that are read again; keys that are never
//! asked for would otherwise stay in memory forever. The [`Janitor`] calls
//! [`Sweep::sweep`] every interval on a background task.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use profilecache_core::{CacheCoordinator, CoordinatorConfig, ProfileFallback};
//! # use profilecache_core::Fetcher;
//! # use profilecache_domain::Profile;
//!
//! # async fn example(fetcher: Arc<dyn Fetcher<Profile>>) -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator =
//!     CacheCoordinator::new(CoordinatorConfig::default(), fetcher, Arc::new(ProfileFallback::default()))?;
//!
//! let mut janitor = coordinator.janitor();
//! janitor.start().await?;
//! // ... application runs ...
//! janitor.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;

use std::sync::Arc;
use std::time::Duration;

use profilecache_common::Clock;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use self::error::{JanitorError, JanitorResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// What one sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired_values: usize,
    pub expired_errors: usize,
    pub stale_retry_states: usize,
}

impl SweepReport {
    /// Total number of removed items
    pub fn total(&self) -> usize {
        self.expired_values + self.expired_errors + self.stale_retry_states
    }
}

/// Something that can drop its own expired state
pub trait Sweep: Send + Sync + 'static {
    /// Remove everything expired as of now
    fn sweep(&self) -> SweepReport;
}

/// Periodic sweeper with start/stop lifecycle
///
/// Waits through the supplied [`Clock`], so the clock's `sleep` must really
/// suspend (the system clock, optionally under paused tokio time).
pub struct Janitor {
    target: Arc<dyn Sweep>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    join_timeout: Duration,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl Janitor {
    /// Create a stopped janitor sweeping `target` every `interval`
    pub fn new(target: Arc<dyn Sweep>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            target,
            clock,
            interval,
            join_timeout: Duration::from_secs(5),
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// How long [`stop`](Self::stop) waits for the task to finish
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Sweep interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the janitor
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::AlreadyRunning`] if the janitor is running.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> JanitorResult<()> {
        if self.is_running() {
            return Err(JanitorError::AlreadyRunning);
        }

        // Fresh token so a stopped janitor can be restarted
        self.cancellation_token = CancellationToken::new();

        let target = Arc::clone(&self.target);
        let clock = Arc::clone(&self.clock);
        let interval = self.interval;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::sweep_loop(target, clock, interval, cancel).await;
        });
        *self.task_handle.lock().await = Some(handle);

        info!(interval_ms = interval.as_millis() as u64, "Janitor started");
        Ok(())
    }

    /// Stop the janitor and wait for the background task
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::NotRunning`] if the janitor is not running,
    /// or [`JanitorError::Timeout`] if the task does not finish within the
    /// join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> JanitorResult<()> {
        if !self.is_running() {
            return Err(JanitorError::NotRunning);
        }

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let duration = self.join_timeout;
            tokio::time::timeout(duration, handle)
                .await
                .map_err(|_| JanitorError::Timeout { duration })??;
        }

        info!("Janitor stopped");
        Ok(())
    }

    /// Whether the background task is alive
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Sweep immediately on the caller's task
    pub fn sweep_once(&self) -> SweepReport {
        let report = self.target.sweep();
        log_report(&report);
        report
    }

    async fn sweep_loop(
        target: Arc<dyn Sweep>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Sweep loop cancelled");
                    break;
                }
                _ = clock.sleep(interval) => {
                    log_report(&target.sweep());
                }
            }
        }
    }
}

fn log_report(report: &SweepReport) {
    if report.total() > 0 {
        info!(
            expired_values = report.expired_values,
            expired_errors = report.expired_errors,
            stale_retry_states = report.stale_retry_states,
            "Sweep removed expired state"
        );
    } else {
        debug!("Sweep found nothing to remove");
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("Janitor dropped while running; cancelling");
        }
        self.cancellation_token.cancel();
    }
}

impl std::fmt::Debug for Janitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Janitor")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
