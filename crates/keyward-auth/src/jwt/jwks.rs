//! JWKS (JSON Web Key Set) fetching and caching
//!
//! - **TTL-based caching**: default 10 minutes
//! - **Refresh on unknown `kid`**: the validator forces one refresh when a
//!   token names a key the cache does not hold (Google rotates keys daily)
//! - **Rate limiting**: forced refreshes closer than 5 seconds apart reuse
//!   the cache
//!
//! HTTPS is required for the endpoint, except for loopback hosts.

use jsonwebtoken::jwk::JwkSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::IdentityError;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    cached_at: SystemTime,
    ttl: Duration,
}

impl CachedJwks {
    fn is_valid(&self) -> bool {
        match SystemTime::now().duration_since(self.cached_at) {
            Ok(age) => age < self.ttl,
            Err(_) => false, // Clock went backwards, invalidate
        }
    }
}

/// Fetches and caches a provider's signing keys
#[derive(Debug, Clone)]
pub struct JwksClient {
    jwks_uri: String,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    http_client: reqwest::Client,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    last_refresh: Arc<RwLock<Option<SystemTime>>>,
}

fn is_loopback(uri: &str) -> bool {
    uri.starts_with("http://localhost") || uri.starts_with("http://127.0.0.1")
}

impl JwksClient {
    /// Client for `jwks_uri` with a 10 minute cache
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Configuration` if the URI is not HTTPS (or
    /// loopback HTTP), or the HTTP client cannot be built.
    pub fn new(jwks_uri: impl Into<String>) -> Result<Self, IdentityError> {
        let jwks_uri = jwks_uri.into();
        if !jwks_uri.starts_with("https://") && !is_loopback(&jwks_uri) {
            return Err(IdentityError::Configuration(
                "JWKS endpoint must use HTTPS (HTTP only allowed for loopback)".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            jwks_uri,
            cache: Arc::new(RwLock::new(None)),
            http_client,
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: MIN_REFRESH_INTERVAL,
            last_refresh: Arc::new(RwLock::new(None)),
        })
    }

    /// Override the cache TTL
    pub fn with_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Override the minimum interval between forced refreshes
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Cached key set, fetching if the cache is empty or stale
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable, answers with a
    /// non-success status, or serves something that is not a JWK set.
    pub async fn get_jwks(&self) -> Result<JwkSet, IdentityError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.is_valid()
            {
                debug!(jwks_uri = %self.jwks_uri, "Using cached JWKS");
                return Ok(cached.jwks.clone());
            }
        }

        self.fetch_and_cache().await
    }

    /// Fetch a fresh key set, ignoring the cache unless rate limited
    ///
    /// # Errors
    ///
    /// Same as [`get_jwks`](Self::get_jwks).
    pub async fn refresh(&self) -> Result<JwkSet, IdentityError> {
        {
            let last_refresh = self.last_refresh.read().await;
            if let Some(last) = *last_refresh
                && let Ok(since_last) = SystemTime::now().duration_since(last)
                && since_last < self.min_refresh_interval
            {
                warn!(
                    jwks_uri = %self.jwks_uri,
                    since_last_ms = since_last.as_millis() as u64,
                    "JWKS refresh rate limited, using cache"
                );
                return self.get_jwks().await;
            }
        }

        self.fetch_and_cache().await
    }

    async fn fetch_and_cache(&self) -> Result<JwkSet, IdentityError> {
        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS");

        // Failed attempts count toward the rate limit too
        *self.last_refresh.write().await = Some(SystemTime::now());

        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| {
                error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                IdentityError::Transport(format!("JWKS fetch failed: {e}"))
            })?;

        if !response.status().is_success() {
            error!(
                jwks_uri = %self.jwks_uri,
                status = %response.status(),
                "JWKS endpoint returned error status"
            );
            return Err(IdentityError::Status {
                endpoint: "jwks",
                status: response.status().as_u16(),
            });
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS JSON");
            IdentityError::MalformedResponse(format!("invalid JWKS: {e}"))
        })?;

        info!(
            jwks_uri = %self.jwks_uri,
            key_count = jwks.keys.len(),
            "Fetched JWKS"
        );

        *self.cache.write().await = Some(CachedJwks {
            jwks: jwks.clone(),
            cached_at: SystemTime::now(),
            ttl: self.cache_ttl,
        });

        Ok(jwks)
    }

    /// The JWKS endpoint URI
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }
}
