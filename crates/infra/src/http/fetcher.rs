use std::time::Duration;

use async_trait::async_trait;
use profilecache_common::FetchError;
use profilecache_core::Fetcher;
use profilecache_domain::{initials_for, Profile, ProfileCacheError};
use reqwest::Client as ReqwestClient;
use tracing::debug;
use url::Url;

use crate::config::{HttpSettings, DEFAULT_USER_AGENT};
use crate::errors::{InfraError, IntoFetchError};

/// [`Fetcher`] that reads profiles from `GET {base_url}/{key}`.
///
/// Makes exactly one request per call. Retries, backoff and negative caching
/// belong to the coordinator driving it.
#[derive(Debug, Clone)]
pub struct HttpProfileFetcher {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl HttpProfileFetcher {
    /// Start building a fetcher for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> HttpProfileFetcherBuilder {
        HttpProfileFetcherBuilder::new(base_url)
    }

    /// Build a fetcher from loaded settings.
    pub fn from_settings(settings: &HttpSettings) -> Result<Self, ProfileCacheError> {
        Self::builder(settings.base_url.clone())
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL for `key`, percent-encoded as a single path segment.
    pub fn profile_url(&self, key: &str) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FetchError::other(format!("base url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .push(key);
        Ok(url)
    }
}

#[async_trait]
impl Fetcher<Profile> for HttpProfileFetcher {
    async fn fetch(&self, key: &str) -> Result<Profile, FetchError> {
        let url = self.profile_url(key)?;
        debug!(%url, "fetching profile");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| err.into_fetch_error(self.timeout))?;

        let status = response.status();
        debug!(%url, %status, "received profile response");
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("unknown status");
            return Err(FetchError::status(status.as_u16(), reason));
        }

        let mut profile: Profile =
            response.json().await.map_err(|err| err.into_fetch_error(self.timeout))?;
        if profile.initials.is_empty() {
            profile.initials = initials_for(&profile.display_name);
        }
        Ok(profile)
    }
}

/// Builder for [`HttpProfileFetcher`].
#[derive(Debug)]
pub struct HttpProfileFetcherBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
    use_system_proxy: bool,
}

impl HttpProfileFetcherBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            use_system_proxy: false,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Honour `HTTP_PROXY`/`HTTPS_PROXY`. Off by default.
    pub fn use_system_proxy(mut self, enabled: bool) -> Self {
        self.use_system_proxy = enabled;
        self
    }

    pub fn build(self) -> Result<HttpProfileFetcher, ProfileCacheError> {
        let base_url = Url::parse(&self.base_url).map_err(|e| {
            ProfileCacheError::Config(format!("Invalid base_url '{}': {e}", self.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ProfileCacheError::Config(format!(
                "base_url cannot carry a path: {base_url}"
            )));
        }

        let mut builder =
            ReqwestClient::builder().timeout(self.timeout).user_agent(self.user_agent);
        if !self.use_system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            ProfileCacheError::from(infra)
        })?;

        Ok(HttpProfileFetcher { client, base_url, timeout: self.timeout })
    }
}
