//! Assembles a profile coordinator from loaded settings

use std::sync::Arc;

use profilecache_common::{Clock, SystemClock};
use profilecache_core::{CacheCoordinator, ProfileFallback};
use profilecache_domain::{Profile, Result};

use crate::config::Settings;
use crate::http::HttpProfileFetcher;

/// Coordinator backed by the HTTP upstream, on the system clock
///
/// # Errors
/// Returns `ProfileCacheError::Config` if the settings do not validate or the
/// HTTP client cannot be built.
pub fn profile_coordinator(settings: &Settings) -> Result<CacheCoordinator<Profile>> {
    profile_coordinator_with_clock(settings, Arc::new(SystemClock))
}

/// Same as [`profile_coordinator`], reading time from `clock`
pub fn profile_coordinator_with_clock(
    settings: &Settings,
    clock: Arc<dyn Clock>,
) -> Result<CacheCoordinator<Profile>> {
    settings.validate()?;

    let fetcher = HttpProfileFetcher::from_settings(&settings.http)?;
    tracing::info!(base_url = %fetcher.base_url(), "Profile coordinator configured");

    let coordinator = CacheCoordinator::<Profile>::builder(
        Arc::new(fetcher),
        Arc::new(ProfileFallback::default()),
    )
    .clock(clock)
    .config(settings.cache.clone())
    .build()?;
    Ok(coordinator)
}
