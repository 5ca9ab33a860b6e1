//! Conversions from external infrastructure errors into crate errors.

use std::time::Duration;

use profilecache_common::FetchError;
use profilecache_domain::ProfileCacheError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ProfileCacheError);

impl From<InfraError> for ProfileCacheError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ProfileCacheError> for InfraError {
    fn from(value: ProfileCacheError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ProfileCacheError (client construction) */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_builder() {
            return InfraError(ProfileCacheError::Config(format!("invalid HTTP client: {value}")));
        }
        InfraError(ProfileCacheError::Network(value.to_string()))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → FetchError (per request) */
/* -------------------------------------------------------------------------- */

/// Maps a request failure onto the fetch taxonomy
///
/// `timeout` is the client's configured request timeout, reported back in
/// [`FetchError::Timeout`].
pub trait IntoFetchError {
    fn into_fetch_error(self, timeout: Duration) -> FetchError;
}

impl IntoFetchError for HttpError {
    fn into_fetch_error(self, timeout: Duration) -> FetchError {
        if self.is_timeout() {
            return FetchError::Timeout(timeout);
        }

        if let Some(status) = self.status() {
            let reason = status.canonical_reason().unwrap_or("unknown status");
            return FetchError::status(status.as_u16(), reason);
        }

        if self.is_decode() || self.is_body() {
            return FetchError::Decode(self.to_string());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return FetchError::network(format!("connection failure: {self}"));
        }

        if self.is_request() {
            return FetchError::network(self.to_string());
        }

        FetchError::other(self.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
