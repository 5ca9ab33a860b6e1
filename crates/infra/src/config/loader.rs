//! Configuration loader
//!
//! Loads [`Settings`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `PROFILECACHE_BASE_URL` is absent or a value is malformed, falls
//!    back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `PROFILECACHE_BASE_URL`: Upstream profile endpoint (required)
//! - `PROFILECACHE_HTTP_TIMEOUT_MS`: HTTP client timeout
//! - `PROFILECACHE_USER_AGENT`: `User-Agent` header
//! - `PROFILECACHE_DEFAULT_TTL_MS`: Lifetime of a cached profile
//! - `PROFILECACHE_MAX_ATTEMPTS`: Fetch attempts per resolution
//! - `PROFILECACHE_BASE_DELAY_MS`: Wait after the first failure
//! - `PROFILECACHE_MAX_BACKOFF_MS`: Cap on the wait between attempts
//! - `PROFILECACHE_SWEEP_INTERVAL_MS`: Janitor period
//! - `PROFILECACHE_RETRY_STATE_IDLE_MS`: Idle time before retry state is dropped
//! - `PROFILECACHE_FETCH_TIMEOUT_MS`: Bound on one fetch attempt
//! - `PROFILECACHE_RETRY_NOT_FOUND`: Whether 404s use the full attempt budget
//! - `PROFILECACHE_ERROR_TTL_<CLASS>_MS`: Negative-cache TTL, e.g.
//!   `PROFILECACHE_ERROR_TTL_RATE_LIMITED_MS`
//!
//! Unset optional variables keep their defaults.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./profilecache.{toml,json}` or `./config.{toml,json}`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::time::Duration;

use profilecache_common::ErrorClass;
use profilecache_core::CoordinatorConfig;
use profilecache_domain::{ProfileCacheError, Result};

use super::{HttpSettings, Settings};

const PREFIX: &str = "PROFILECACHE_";

const FILE_NAMES: [&str; 4] =
    ["profilecache.toml", "profilecache.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If that fails,
/// falls back to loading from a config file. The result is validated.
///
/// # Errors
/// Returns `ProfileCacheError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded settings fail validation
pub fn load() -> Result<Settings> {
    let settings = match load_from_env() {
        Ok(settings) => {
            tracing::info!("Configuration loaded from environment variables");
            settings
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)?
        }
    };
    settings.validate()?;
    Ok(settings)
}

/// Load configuration from process environment variables
///
/// # Errors
/// Returns `ProfileCacheError::Config` if `PROFILECACHE_BASE_URL` is missing
/// or any present variable has an invalid value.
pub fn load_from_env() -> Result<Settings> {
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Load configuration through an arbitrary variable lookup
///
/// [`load_from_env`] passes `std::env::var`; tests pass a map.
///
/// # Errors
/// Same as [`load_from_env`].
pub fn load_from_lookup<F>(lookup: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };

    let mut http = HttpSettings::new(env.required("BASE_URL")?);
    if let Some(timeout) = env.millis("HTTP_TIMEOUT_MS")? {
        http.timeout = timeout;
    }
    if let Some(user_agent) = env.get("USER_AGENT") {
        http.user_agent = user_agent;
    }

    let mut cache = CoordinatorConfig::default();
    if let Some(ttl) = env.millis("DEFAULT_TTL_MS")? {
        cache.default_ttl = ttl;
    }
    if let Some(attempts) = env.parsed::<u32>("MAX_ATTEMPTS")? {
        cache.max_attempts = attempts;
    }
    if let Some(delay) = env.millis("BASE_DELAY_MS")? {
        cache.base_delay = delay;
    }
    if let Some(delay) = env.millis("MAX_BACKOFF_MS")? {
        cache.max_backoff = delay;
    }
    if let Some(interval) = env.millis("SWEEP_INTERVAL_MS")? {
        cache.sweep_interval = interval;
    }
    if let Some(idle) = env.millis("RETRY_STATE_IDLE_MS")? {
        cache.retry_state_idle = idle;
    }
    if let Some(timeout) = env.millis("FETCH_TIMEOUT_MS")? {
        cache.fetch_timeout = timeout;
    }
    if let Some(retry) = env.flag("RETRY_NOT_FOUND")? {
        cache.retry_not_found = retry;
    }
    for class in ErrorClass::ALL {
        let name = format!("ERROR_TTL_{}_MS", class.as_str().to_ascii_uppercase());
        if let Some(ttl) = env.millis(&name)? {
            cache.error_ttl_by_class.insert(class, ttl);
        }
    }

    Ok(Settings { http, cache })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations with
/// [`probe_config_paths`]. Format is chosen by file extension.
///
/// # Errors
/// Returns `ProfileCacheError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Settings> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ProfileCacheError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ProfileCacheError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ProfileCacheError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse settings by file extension; files without one are read as TOML
fn parse_config(contents: &str, path: &Path) -> Result<Settings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ProfileCacheError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ProfileCacheError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(ProfileCacheError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    probe_in(&dirs)
}

fn probe_in(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, suffix: &str) -> Option<String> {
        (self.lookup)(&format!("{PREFIX}{suffix}")).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, suffix: &str) -> Result<String> {
        self.get(suffix).ok_or_else(|| {
            ProfileCacheError::Config(format!(
                "Missing required environment variable: {PREFIX}{suffix}"
            ))
        })
    }

    fn parsed<T>(&self, suffix: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(suffix)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    ProfileCacheError::Config(format!("Invalid {PREFIX}{suffix} '{raw}': {e}"))
                })
            })
            .transpose()
    }

    fn millis(&self, suffix: &str) -> Result<Option<Duration>> {
        Ok(self.parsed::<u64>(suffix)?.map(Duration::from_millis))
    }

    /// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`
    fn flag(&self, suffix: &str) -> Result<Option<bool>> {
        self.get(suffix)
            .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ProfileCacheError::Config(format!(
                    "Invalid {PREFIX}{suffix} '{raw}': expected a boolean"
                ))),
            })
            .transpose()
    }
}
