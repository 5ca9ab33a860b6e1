//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading settings from files.

use std::path::PathBuf;
use std::time::Duration;

use profilecache_common::ErrorClass;
use profilecache_infra::config;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("Failed to write config file");
    path
}

#[test]
fn test_load_config_from_toml_file() {
    let dir = TempDir::new().expect("temp dir");
    let path = write(
        &dir,
        "profilecache.toml",
        r#"
[http]
base_url = "https://directory.internal/api/profiles"
timeout = 2000
user_agent = "integration/1.0"

[cache]
default_ttl = 120000
max_attempts = 4
base_delay = 500
max_backoff = 4000
retry_not_found = false

[cache.error_ttl_by_class]
rate_limited = 15000
"#,
    );

    let settings = config::load_from_file(Some(path)).expect("settings");
    settings.validate().expect("valid settings");

    assert_eq!(settings.http.base_url, "https://directory.internal/api/profiles");
    assert_eq!(settings.http.timeout, Duration::from_secs(2));
    assert_eq!(settings.http.user_agent, "integration/1.0");
    assert_eq!(settings.cache.default_ttl, Duration::from_secs(120));
    assert_eq!(settings.cache.max_attempts, 4);
    assert_eq!(settings.cache.base_delay, Duration::from_millis(500));
    assert_eq!(settings.cache.max_backoff, Duration::from_secs(4));
    assert!(!settings.cache.retry_not_found);
    assert_eq!(settings.cache.error_ttl(ErrorClass::RateLimited), Duration::from_secs(15));
    // Classes left out of the file keep their defaults
    assert_eq!(settings.cache.error_ttl(ErrorClass::ServerError), Duration::from_secs(120));
}

#[test]
fn test_load_config_from_json_file_with_defaults() {
    let dir = TempDir::new().expect("temp dir");
    let path = write(&dir, "config.json", r#"{ "http": { "base_url": "http://127.0.0.1:9000" } }"#);

    let settings = config::load_from_file(Some(path)).expect("settings");

    assert_eq!(settings.http.timeout, Duration::from_secs(10));
    assert!(settings.http.user_agent.starts_with("profilecache/"));
    assert_eq!(settings.cache.max_attempts, 3);
    assert_eq!(settings.cache.base_delay, Duration::from_secs(1));
    assert_eq!(settings.cache.default_ttl, Duration::from_secs(300));
    assert_eq!(settings.cache.error_ttl(ErrorClass::NotFound), Duration::from_secs(300));
    assert!(settings.cache.retry_not_found);
}

#[test]
fn test_load_config_missing_http_section() {
    let dir = TempDir::new().expect("temp dir");
    let path = write(&dir, "config.toml", "[cache]\nmax_attempts = 2\n");

    let err = config::load_from_file(Some(path)).expect_err("http section is required");
    assert!(err.to_string().contains("TOML"), "unexpected error: {err}");
}

#[test]
fn test_loaded_settings_can_fail_validation() {
    let dir = TempDir::new().expect("temp dir");
    let path = write(
        &dir,
        "config.toml",
        "[http]\nbase_url = \"http://localhost\"\n\n[cache]\nbase_delay = 5000\nmax_backoff = 1000\n",
    );

    let settings = config::load_from_file(Some(path)).expect("parses");
    let err = settings.validate().expect_err("backoff range");
    assert!(err.to_string().contains("max_backoff"), "unexpected error: {err}");
}

#[test]
fn test_env_lookup_overrides_defaults_only_where_set() {
    let vars = [
        ("PROFILECACHE_BASE_URL", "http://localhost:8080/profiles"),
        ("PROFILECACHE_ERROR_TTL_NOT_FOUND_MS", "1000"),
        ("PROFILECACHE_ERROR_TTL_NETWORK_ERROR_MS", "2000"),
    ];
    let settings = config::load_from_lookup(|key| {
        vars.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v).to_string())
    })
    .expect("settings");

    assert_eq!(settings.cache.error_ttl(ErrorClass::NotFound), Duration::from_secs(1));
    assert_eq!(settings.cache.error_ttl(ErrorClass::NetworkError), Duration::from_secs(2));
    assert_eq!(settings.cache.error_ttl(ErrorClass::RateLimited), Duration::from_secs(30));
    assert_eq!(settings.cache.max_attempts, 3);
}
