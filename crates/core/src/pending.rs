//! Request coalescing
//!
//! [`PendingRequestRegistry`] keeps at most one in-flight operation per key.
//! The first caller spawns the operation on the runtime; everyone who
//! arrives before it settles awaits the same [`Shared`] future and receives
//! a clone of its output.
//!
//! The spawned task removes its own registry entry before its output becomes
//! visible, including when it panics, so a caller that observes an outcome
//! and immediately asks again always starts a fresh operation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, error};

/// Failure of the coalesced operation itself, not of what it computed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PendingError {
    /// The operation panicked or its task was cancelled
    #[error("pending operation for '{key}' aborted: {message}")]
    Aborted { key: String, message: String },
}

impl PendingError {
    fn from_join(key: &str, err: JoinError) -> Self {
        let message = if err.is_panic() {
            let payload = err.into_panic();
            payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .map_or_else(|| "operation panicked".to_string(), |m| format!("panicked: {m}"))
        } else {
            "operation cancelled".to_string()
        };
        Self::Aborted { key: key.to_string(), message }
    }
}

type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T, PendingError>>>;
type InflightMap<T> = Arc<Mutex<HashMap<String, PendingEntry<T>>>>;

struct PendingEntry<T: Clone> {
    id: u64,
    future: SharedOutcome<T>,
}

/// Removes a registry entry when the owning task finishes or unwinds
struct RemoveOnDrop<T: Clone> {
    inflight: InflightMap<T>,
    key: String,
    id: u64,
}

impl<T: Clone> Drop for RemoveOnDrop<T> {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        if inflight.get(&self.key).is_some_and(|entry| entry.id == self.id) {
            inflight.remove(&self.key);
        }
    }
}

/// At most one in-flight operation per key
pub struct PendingRequestRegistry<T: Clone> {
    inflight: InflightMap<T>,
    next_id: AtomicU64,
}

impl<T> PendingRequestRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty registry
    pub fn new() -> Self {
        Self { inflight: Arc::new(Mutex::new(HashMap::new())), next_id: AtomicU64::new(0) }
    }

    /// Await the in-flight operation for `key`, starting `op` if there is none
    ///
    /// `op` is only invoked when this call becomes the leader. The spawned
    /// operation keeps running even if every caller stops waiting.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn coalesce<F, Fut>(&self, key: &str, op: F) -> Result<T, PendingError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock();
            match inflight.get(key) {
                Some(entry) => {
                    debug!(key, "joining in-flight request");
                    entry.future.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let future = self.spawn(key, id, op());
                    inflight.insert(key.to_string(), PendingEntry { id, future: future.clone() });
                    future
                }
            }
        };

        shared.await
    }

    /// Whether an operation for `key` is in flight
    pub fn is_pending(&self, key: &str) -> bool {
        self.inflight.lock().contains_key(key)
    }

    /// Number of in-flight operations
    pub fn len(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Whether nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.inflight.lock().is_empty()
    }

    fn spawn<Fut>(&self, key: &str, id: u64, operation: Fut) -> SharedOutcome<T>
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let guard = RemoveOnDrop { inflight: Arc::clone(&self.inflight), key: key.to_string(), id };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            operation.await
        });

        let key = key.to_string();
        async move {
            handle.await.map_err(|err| {
                let err = PendingError::from_join(&key, err);
                error!(error = %err, "coalesced operation did not complete");
                err
            })
        }
        .boxed()
        .shared()
    }
}

impl<T> Default for PendingRequestRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> std::fmt::Debug for PendingRequestRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequestRegistry").field("len", &self.inflight.lock().len()).finish()
    }
}
