//! Shared test helpers for `profilecache-core` integration tests.
//!
//! Fetchers with scripted behaviour, plus a constructor wiring them into a
//! coordinator on a mock clock.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use profilecache_common::{Clock, FetchError, MockClock};
use profilecache_core::{CacheCoordinator, CoordinatorConfig, Fetcher, ProfileFallback};
use profilecache_domain::Profile;
use tokio::sync::Semaphore;

/// A real-looking profile for `key`
pub fn profile(key: &str) -> Profile {
    Profile {
        id: key.to_string(),
        display_name: format!("User {key}"),
        avatar_url: Some(format!("https://cdn.example.com/{key}.png")),
        initials: "US".to_string(),
        color: "#3498db".to_string(),
        updated_at: None,
    }
}

/// Replays queued outcomes, then repeats a default
///
/// Records the clock offset of every call.
pub struct ScriptedFetcher {
    clock: Arc<dyn Clock>,
    start: Instant,
    script: Mutex<VecDeque<Result<Profile, FetchError>>>,
    default: Result<Profile, FetchError>,
    calls: Mutex<Vec<(String, Duration)>>,
}

impl ScriptedFetcher {
    pub fn always(clock: Arc<dyn Clock>, outcome: Result<Profile, FetchError>) -> Self {
        Self::new(clock, Vec::new(), outcome)
    }

    pub fn new(
        clock: Arc<dyn Clock>,
        script: Vec<Result<Profile, FetchError>>,
        default: Result<Profile, FetchError>,
    ) -> Self {
        let start = clock.now();
        Self {
            clock,
            start,
            script: Mutex::new(script.into()),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of fetches so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Offsets from construction at which fetches started
    pub fn call_offsets(&self) -> Vec<Duration> {
        self.calls.lock().iter().map(|(_, at)| *at).collect()
    }

    /// Keys fetched, in order
    pub fn keys(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(key, _)| key.clone()).collect()
    }
}

#[async_trait]
impl Fetcher<Profile> for ScriptedFetcher {
    async fn fetch(&self, key: &str) -> Result<Profile, FetchError> {
        let at = self.clock.now().duration_since(self.start);
        self.calls.lock().push((key.to_string(), at));

        let next = self.script.lock().pop_front();
        match next.unwrap_or_else(|| self.default.clone()) {
            Ok(mut value) => {
                value.id = key.to_string();
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }
}

/// Blocks every fetch until the test releases it, then returns its outcome
pub struct GatedFetcher {
    gate: Semaphore,
    calls: AtomicUsize,
    failure: Option<FetchError>,
}

impl GatedFetcher {
    /// Released fetches succeed with [`profile`]
    pub fn new() -> Self {
        Self { gate: Semaphore::new(0), calls: AtomicUsize::new(0), failure: None }
    }

    /// Released fetches fail with `error`
    pub fn failing(error: FetchError) -> Self {
        Self { failure: Some(error), ..Self::new() }
    }

    pub fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Yield until at least `calls` fetches have started
    pub async fn wait_for_calls(&self, calls: usize) {
        while self.call_count() < calls {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Fetcher<Profile> for GatedFetcher {
    async fn fetch(&self, key: &str) -> Result<Profile, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await.map_err(|e| FetchError::other(e.to_string()))?;
        permit.forget();
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(profile(key)),
        }
    }
}

/// Never completes
#[derive(Default)]
pub struct HangingFetcher {
    calls: AtomicUsize,
}

impl HangingFetcher {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher<Profile> for HangingFetcher {
    async fn fetch(&self, _key: &str) -> Result<Profile, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        futures::future::pending().await
    }
}

/// Panics on every call
#[derive(Default)]
pub struct PanickingFetcher;

#[async_trait]
impl Fetcher<Profile> for PanickingFetcher {
    async fn fetch(&self, key: &str) -> Result<Profile, FetchError> {
        panic!("fetcher bug while loading {key}");
    }
}

/// Coordinator over `fetcher` on `clock` with the given config
pub fn coordinator(
    clock: &MockClock,
    fetcher: Arc<dyn Fetcher<Profile>>,
    config: CoordinatorConfig,
) -> CacheCoordinator<Profile> {
    CacheCoordinator::builder(fetcher, Arc::new(ProfileFallback::default()))
        .clock(Arc::new(clock.clone()))
        .config(config)
        .build()
        .expect("test config should validate")
}
