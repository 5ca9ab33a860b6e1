//! Integration tests for `CacheCoordinator`.
//!
//! Time is driven by a `MockClock`: retry waits advance it instantly, and
//! tests advance it by hand to cross TTL boundaries.

mod support;

use std::sync::Arc;
use std::time::Duration;

use profilecache_common::{ErrorClass, FetchError, MockClock, SystemClock};
use profilecache_core::{
    CacheCoordinator, CoordinatorConfig, FallbackProvider, Fetcher, ProfileFallback,
};
use profilecache_domain::Profile;
use support::{
    coordinator, profile, GatedFetcher, HangingFetcher, PanickingFetcher, ScriptedFetcher,
};

fn rate_limited() -> FetchError {
    FetchError::status(429, "Too Many Requests")
}

/// Validates request coalescing.
///
/// Assertions:
/// - 50 concurrent `get` calls cause exactly one fetch.
/// - Every caller receives the same profile.
/// - Nothing is left pending afterwards.
#[tokio::test]
async fn concurrent_gets_share_one_fetch() {
    let clock = MockClock::new();
    let fetcher = Arc::new(GatedFetcher::new());
    let coordinator = coordinator(&clock, fetcher.clone(), CoordinatorConfig::default());

    let mut callers = Vec::new();
    for _ in 0..50 {
        let coordinator = coordinator.clone();
        callers.push(tokio::spawn(async move { coordinator.get("u-1").await }));
    }

    while fetcher.call_count() == 0 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(coordinator.stats().pending_count, 1);
    fetcher.release(1);

    for caller in callers {
        assert_eq!(caller.await.expect("caller task"), profile("u-1"));
    }
    assert_eq!(fetcher.call_count(), 1);

    let stats = coordinator.stats();
    assert_eq!(stats.pending_count, 0);
    assert_eq!(stats.fetch_attempts, 1);
    assert_eq!(stats.cache_size, 1);
}

/// Validates coalescing when every attempt fails.
///
/// Assertions:
/// - 20 concurrent `get` calls cause exactly `max_attempts` fetches.
/// - Every caller receives the same fallback.
/// - One failure is negative-cached.
#[tokio::test]
async fn concurrent_gets_share_one_degraded_resolution() {
    let clock = MockClock::new();
    let fetcher = Arc::new(GatedFetcher::failing(rate_limited()));
    let coordinator = coordinator(&clock, fetcher.clone(), CoordinatorConfig::default());

    let mut callers = Vec::new();
    for _ in 0..20 {
        let coordinator = coordinator.clone();
        callers.push(tokio::spawn(async move { coordinator.get("k").await }));
    }

    fetcher.wait_for_calls(1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(coordinator.stats().pending_count, 1);
    fetcher.release(10);

    let expected = ProfileFallback::default().fallback("k");
    for caller in callers {
        assert_eq!(caller.await.expect("caller task"), expected);
    }
    assert_eq!(fetcher.call_count(), 3);

    let stats = coordinator.stats();
    assert_eq!(stats.fetch_attempts, 3);
    assert_eq!(stats.error_cache_size, 1);
    assert_eq!(stats.pending_count, 0);
}

/// Validates that `invalidate` during a resolution keeps the attempt bound.
///
/// Assertions:
/// - Wiping retry state mid-flight does not grant extra attempts.
/// - The resolution still caches its failure when it settles.
#[tokio::test]
async fn invalidate_during_resolution_keeps_attempt_bound() {
    let clock = MockClock::new();
    let fetcher = Arc::new(GatedFetcher::failing(rate_limited()));
    let coordinator = coordinator(&clock, fetcher.clone(), CoordinatorConfig::default());

    let caller = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.get("k").await })
    };

    fetcher.release(1);
    fetcher.wait_for_calls(2).await;
    coordinator.invalidate("k");
    fetcher.release(10);

    assert!(caller.await.expect("caller task").is_placeholder());
    assert_eq!(fetcher.call_count(), 3);
    assert_eq!(coordinator.stats().error_cache_size, 1);
}

/// Validates that `clear` during a resolution keeps the attempt bound.
#[tokio::test]
async fn clear_during_resolution_keeps_attempt_bound() {
    let clock = MockClock::new();
    let fetcher = Arc::new(GatedFetcher::failing(rate_limited()));
    let coordinator = coordinator(&clock, fetcher.clone(), CoordinatorConfig::default());

    let caller = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.get("k").await })
    };

    fetcher.release(2);
    fetcher.wait_for_calls(3).await;
    coordinator.clear();
    fetcher.release(10);

    caller.await.expect("caller task");
    assert_eq!(fetcher.call_count(), 3);
}

/// Validates positive TTL.
///
/// Assertions:
/// - Within `default_ttl` the cached value is served without a fetch.
/// - Once `default_ttl` has passed the next `get` fetches again.
#[tokio::test]
async fn positive_ttl_controls_refetch() {
    let clock = MockClock::new();
    let fetcher = Arc::new(ScriptedFetcher::always(Arc::new(clock.clone()), Ok(profile("x"))));
    let config = CoordinatorConfig::builder()
        .default_ttl(Duration::from_secs(60))
        .build()
        .expect("valid config");
    let coordinator = coordinator(&clock, fetcher.clone(), config);

    assert_eq!(coordinator.get("u-1").await.display_name, "User x");
    clock.advance(Duration::from_secs(60));
    coordinator.get("u-1").await;
    assert_eq!(fetcher.call_count(), 1);

    clock.advance(Duration::from_millis(1));
    coordinator.get("u-1").await;
    assert_eq!(fetcher.call_count(), 2);

    let stats = coordinator.stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 2);
}

/// Validates the rate-limited scenario end to end.
///
/// Assertions:
/// - Three fetches start at 0ms, 1000ms and 3000ms.
/// - The failure is cached as `RateLimited`.
/// - A `get` at 3500ms serves the fallback with no fourth fetch.
/// - Once the 30s class TTL has passed, a fresh fetch is made.
#[tokio::test]
async fn rate_limited_key_retries_then_degrades() {
    let clock = MockClock::new();
    let fetcher = Arc::new(ScriptedFetcher::always(Arc::new(clock.clone()), Err(rate_limited())));
    let coordinator = coordinator(&clock, fetcher.clone(), CoordinatorConfig::default());
    let fallback = ProfileFallback::default().fallback("conv-1");

    assert_eq!(coordinator.get("conv-1").await, fallback);
    assert_eq!(
        fetcher.call_offsets(),
        vec![Duration::ZERO, Duration::from_millis(1_000), Duration::from_millis(3_000)]
    );
    assert_eq!(clock.elapsed(), Duration::from_millis(3_000));

    let stats = coordinator.stats();
    assert_eq!(stats.error_cache_size, 1);
    assert_eq!(stats.retry_state_count, 0);

    clock.set_elapsed(Duration::from_millis(3_500));
    assert_eq!(coordinator.get("conv-1").await, fallback);
    assert_eq!(fetcher.call_count(), 3);
    assert_eq!(coordinator.stats().negative_hits, 1);

    clock.set_elapsed(Duration::from_millis(3_000 + 30_001));
    coordinator.get("conv-1").await;
    assert_eq!(fetcher.call_count(), 6);
}

/// Validates that an intermittent failure is absorbed by the retry budget.
///
/// Assertions:
/// - Two failures then a success yield the real value.
/// - Retry state is cleared and nothing lands in the negative cache.
#[tokio::test]
async fn intermittent_failures_recover() {
    let clock = MockClock::new();
    let fetcher = Arc::new(ScriptedFetcher::new(
        Arc::new(clock.clone()),
        vec![Err(FetchError::status(503, "unavailable")), Err(FetchError::network("reset"))],
        Ok(profile("x")),
    ));
    let coordinator = coordinator(&clock, fetcher.clone(), CoordinatorConfig::default());

    let value = coordinator.get("u-2").await;

    assert_eq!(value.id, "u-2");
    assert!(!value.is_placeholder());
    assert_eq!(fetcher.call_count(), 3);

    let stats = coordinator.stats();
    assert_eq!(stats.error_cache_size, 0);
    assert_eq!(stats.retry_state_count, 0);
    assert_eq!(stats.fallbacks_served, 0);
}

/// Validates that `NotFound` uses the full budget by default.
#[tokio::test]
async fn not_found_is_retried_by_default() {
    let clock = MockClock::new();
    let fetcher = Arc::new(ScriptedFetcher::always(
        Arc::new(clock.clone()),
        Err(FetchError::status(404, "no such user")),
    ));
    let coordinator = coordinator(&clock, fetcher.clone(), CoordinatorConfig::default());

    coordinator.get("ghost").await;
    assert_eq!(fetcher.call_count(), 3);

    // Cached for the NotFound TTL (5 min), not the RateLimited one.
    clock.advance(Duration::from_secs(299));
    coordinator.get("ghost").await;
    assert_eq!(fetcher.call_count(), 3);
}

/// Validates `retry_not_found = false`.
///
/// Assertions:
/// - A `NotFound` failure is cached after a single fetch with no waiting.
#[tokio::test]
async fn not_found_can_skip_retries() {
    let clock = MockClock::new();
    let fetcher = Arc::new(ScriptedFetcher::always(
        Arc::new(clock.clone()),
        Err(FetchError::status(404, "no such user")),
    ));
    let config = CoordinatorConfig::builder().retry_not_found(false).build().expect("valid");
    let coordinator = coordinator(&clock, fetcher.clone(), config);

    let value = coordinator.get("ghost").await;

    assert!(value.is_placeholder());
    assert_eq!(fetcher.call_count(), 1);
    assert!(clock.sleeps().is_empty());
    assert_eq!(coordinator.stats().retry_state_count, 0);
}

/// Validates that the last failure decides the cached class.
#[tokio::test]
async fn last_failure_decides_class() {
    let clock = MockClock::new();
    let fetcher = Arc::new(ScriptedFetcher::new(
        Arc::new(clock.clone()),
        vec![Err(rate_limited()), Err(rate_limited())],
        Err(FetchError::status(500, "boom")),
    ));
    let config = CoordinatorConfig::builder()
        .error_ttl(ErrorClass::RateLimited, Duration::from_secs(1))
        .error_ttl(ErrorClass::ServerError, Duration::from_secs(100))
        .build()
        .expect("valid");
    let coordinator = coordinator(&clock, fetcher.clone(), config);

    coordinator.get("k").await;
    clock.advance(Duration::from_secs(50));
    coordinator.get("k").await;

    assert_eq!(fetcher.call_count(), 3);
}

/// Validates fallback determinism across failures and keys.
#[tokio::test]
async fn fallback_is_deterministic() {
    let clock = MockClock::new();
    let fetcher =
        Arc::new(ScriptedFetcher::always(Arc::new(clock.clone()), Err(FetchError::other("x"))));
    let coordinator = coordinator(&clock, fetcher, CoordinatorConfig::default());

    let first = coordinator.get("same-key").await;
    let second = coordinator.get("same-key").await;
    let other = coordinator.get("other-key").await;

    assert_eq!(first, second);
    assert_eq!(first, ProfileFallback::default().fallback("same-key"));
    assert_ne!(first.id, other.id);
    assert_eq!(coordinator.stats().fallbacks_served, 3);
}

/// Validates that a hanging fetcher is bounded by `fetch_timeout`.
///
/// Assertions:
/// - `get` returns the fallback.
/// - The failure is cached as a network error.
#[tokio::test(start_paused = true)]
async fn hanging_fetcher_times_out() {
    let fetcher = Arc::new(HangingFetcher::default());
    let coordinator: CacheCoordinator<Profile> = CacheCoordinator::builder(
        fetcher.clone() as Arc<dyn Fetcher<Profile>>,
        Arc::new(ProfileFallback::default()),
    )
    .clock(Arc::new(SystemClock))
    .config(
        CoordinatorConfig::builder()
            .fetch_timeout(Duration::from_secs(2))
            .error_ttl(ErrorClass::NetworkError, Duration::from_secs(30))
            .build()
            .expect("valid"),
    )
    .build()
    .expect("valid");

    let start = tokio::time::Instant::now();
    let value = coordinator.get("slow").await;

    assert!(value.is_placeholder());
    assert_eq!(fetcher.call_count(), 3);
    // Three 2s timeouts plus 1s and 2s of backoff.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(9) && elapsed < Duration::from_secs(10), "{elapsed:?}");

    coordinator.get("slow").await;
    assert_eq!(fetcher.call_count(), 3);
}

/// Validates that a panicking fetcher degrades instead of propagating.
///
/// Assertions:
/// - `get` returns the fallback and leaves no pending entry.
/// - The aborted resolution is cached as `Unknown`, so the next `get` is a
///   negative hit with no new fetch.
/// - Once the `Unknown` TTL passes the fetcher is tried again.
#[tokio::test]
async fn panicking_fetcher_degrades() {
    let clock = MockClock::new();
    let coordinator =
        coordinator(&clock, Arc::new(PanickingFetcher), CoordinatorConfig::default());

    let value = coordinator.get("boom").await;
    assert!(value.is_placeholder());

    let stats = coordinator.stats();
    assert_eq!(stats.pending_count, 0);
    assert_eq!(stats.cache_size, 0);
    assert_eq!(stats.error_cache_size, 1);
    assert_eq!(stats.retry_state_count, 0);
    assert_eq!(stats.fallbacks_served, 1);

    assert_eq!(coordinator.get("boom").await, value);
    let stats = coordinator.stats();
    assert_eq!(stats.fetch_attempts, 1);
    assert_eq!(stats.negative_hits, 1);

    let ttl = coordinator.config().error_ttl(ErrorClass::Unknown);
    clock.advance(ttl + Duration::from_millis(1));
    coordinator.get("boom").await;
    assert_eq!(coordinator.stats().fetch_attempts, 2);
}

/// Validates that negative caching is scoped per key.
#[tokio::test]
async fn failures_do_not_leak_across_keys() {
    let clock = MockClock::new();
    let fetcher = Arc::new(ScriptedFetcher::new(
        Arc::new(clock.clone()),
        vec![Err(rate_limited()), Err(rate_limited()), Err(rate_limited())],
        Ok(profile("x")),
    ));
    let coordinator = coordinator(&clock, fetcher.clone(), CoordinatorConfig::default());

    assert!(coordinator.get("a").await.is_placeholder());
    assert!(!coordinator.get("b").await.is_placeholder());
    assert_eq!(fetcher.keys(), vec!["a", "a", "a", "b"]);
}

/// Validates `invalidate`.
///
/// Assertions:
/// - Both the cached value and cached failures are dropped.
#[tokio::test]
async fn invalidate_forces_refetch() {
    let clock = MockClock::new();
    let fetcher = Arc::new(ScriptedFetcher::new(
        Arc::new(clock.clone()),
        vec![Err(rate_limited()), Err(rate_limited()), Err(rate_limited())],
        Ok(profile("x")),
    ));
    let coordinator = coordinator(&clock, fetcher.clone(), CoordinatorConfig::default());

    assert!(coordinator.get("k").await.is_placeholder());
    coordinator.invalidate("k");
    assert!(!coordinator.get("k").await.is_placeholder());
    assert_eq!(fetcher.call_count(), 4);

    coordinator.invalidate("k");
    coordinator.get("k").await;
    assert_eq!(fetcher.call_count(), 5);

    coordinator.clear();
    assert_eq!(coordinator.stats().cache_size, 0);
}

/// Validates `sweep` on expired state.
#[tokio::test]
async fn sweep_reports_expired_state() {
    let clock = MockClock::new();
    let fetcher = Arc::new(ScriptedFetcher::new(
        Arc::new(clock.clone()),
        vec![Ok(profile("x"))],
        Err(rate_limited()),
    ));
    let config = CoordinatorConfig::builder()
        .default_ttl(Duration::from_secs(10))
        .error_ttl(ErrorClass::RateLimited, Duration::from_secs(10))
        .build()
        .expect("valid");
    let coordinator = coordinator(&clock, fetcher, config);

    coordinator.get("ok").await;
    coordinator.get("bad").await;
    assert_eq!(coordinator.sweep().total(), 0);

    clock.advance(Duration::from_secs(11));
    let report = coordinator.sweep();
    assert_eq!(report.expired_values, 1);
    assert_eq!(report.expired_errors, 1);
    assert_eq!(coordinator.stats().cache_size, 0);
}

/// Validates that independent coordinators share nothing.
#[tokio::test]
async fn coordinators_are_independent() {
    let clock = MockClock::new();
    let fetcher = Arc::new(ScriptedFetcher::always(Arc::new(clock.clone()), Ok(profile("x"))));
    let first = coordinator(&clock, fetcher.clone(), CoordinatorConfig::default());
    let second = coordinator(&clock, fetcher.clone(), CoordinatorConfig::default());

    first.get("k").await;
    second.get("k").await;

    assert_eq!(fetcher.call_count(), 2);
}
