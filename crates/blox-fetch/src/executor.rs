//! Request executor
//!
//! Runs one `RequestDescriptor` against its upstream service:
//!
//! 1. Resolve the service (an unknown name fails before any I/O)
//! 2. Serve from the cache when the descriptor is cacheable and an entry is live
//! 3. Attach credentials from the session
//! 4. Send with a bounded timeout
//! 5. On an anti-forgery rejection, refresh the token once and retry
//! 6. On 429, back off per `Retry-After` and retry up to the attempt ceiling,
//!    unless the requested wait exceeds the configured maximum
//! 7. Classify any other non-2xx response and surface it
//! 8. Decode a 2xx body, cache it, return it
//!
//! Timeouts and transport failures are never retried.

use std::sync::Arc;
use std::time::Instant;

use blox_session::{AttachedCredentials, Session, TOKEN_MINT_PATH};
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::cache::{CacheStore, Invalidation};
use crate::classify::{classify, is_csrf_rejection, parse_retry_after};
use crate::config::FetchConfig;
use crate::descriptor::RequestDescriptor;
use crate::error::{ErrorKind, ErrorRecord, Result};
use crate::router::{AUTH_SERVICE, ServiceRouter};

/// Response as read off the wire, before classification.
struct RawResponse {
    status: u16,
    headers: HeaderMap,
    body: String,
}

/// Request core for one client context: router, cache and session together.
pub struct Fetcher {
    http: reqwest::Client,
    router: ServiceRouter,
    cache: CacheStore,
    session: Arc<Session>,
    config: FetchConfig,
}

impl Fetcher {
    /// Build a fetcher with a fresh, unauthenticated session.
    ///
    /// The session mints anti-forgery tokens against the router's `Auth`
    /// service, so overriding `Auth` redirects minting too.
    pub fn new(router: ServiceRouter, config: FetchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ErrorRecord::network(format!("failed to build HTTP client: {e}")))?;

        let mint_url = router.url_for(AUTH_SERVICE, TOKEN_MINT_PATH, &[])?;
        let session = Arc::new(Session::new(http.clone(), mint_url.as_str(), config.timeout));

        let cache = if config.cache_enabled {
            CacheStore::new(config.cache_ttl)
        } else {
            CacheStore::disabled()
        };

        Ok(Self {
            http,
            router,
            cache,
            session,
            config,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn router(&self) -> &ServiceRouter {
        &self.router
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Execute `descriptor` and return the decoded JSON body.
    #[instrument(
        skip_all,
        fields(
            request_id = %new_request_id(),
            method = %descriptor.method(),
            service = descriptor.service(),
            path = descriptor.path(),
        )
    )]
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<Arc<Value>> {
        let url = self
            .router
            .url_for(descriptor.service(), descriptor.path(), descriptor.params())?;

        let use_cache = descriptor.cacheable() && self.cache.is_enabled();
        if use_cache {
            if let Some(value) = self.cache.get(descriptor.fingerprint()).await {
                debug!("cache hit");
                crate::metrics::record_cache(true);
                return Ok(value);
            }
            crate::metrics::record_cache(false);
        }

        let mut credentials = self
            .session
            .attach(descriptor.cookie(), descriptor.is_mutating())
            .await;
        let mut csrf_refreshed = false;
        let mut rate_limited = 0u32;

        loop {
            let response = self.send(descriptor, &url, &credentials).await?;
            let status = response.status;

            if (200..300).contains(&status) {
                let value = Arc::new(decode_body(status, &response.body)?);
                if use_cache {
                    self.cache
                        .put(
                            descriptor.fingerprint().clone(),
                            value.clone(),
                            self.cache.default_ttl(),
                        )
                        .await;
                }
                return Ok(value);
            }

            if is_csrf_rejection(status, &response.headers) && !csrf_refreshed {
                csrf_refreshed = true;
                warn!(
                    generation = credentials.generation,
                    overridden = credentials.overridden,
                    "anti-forgery token rejected, refreshing"
                );
                crate::metrics::record_retry("csrf");
                let token = self.refresh_for(&credentials).await?;
                credentials = credentials.with_csrf_token(token);
                continue;
            }

            if status == 429 {
                rate_limited += 1;
                let wait = parse_retry_after(&response.headers)
                    .unwrap_or(self.config.rate_limit_default_backoff);
                if wait > self.config.rate_limit_max_backoff {
                    warn!(
                        wait_ms = wait.as_millis() as u64,
                        max_backoff_ms = self.config.rate_limit_max_backoff.as_millis() as u64,
                        "rate limit wait exceeds maximum, not retrying"
                    );
                } else if rate_limited < self.config.rate_limit_max_attempts {
                    warn!(
                        attempt = rate_limited,
                        max_attempts = self.config.rate_limit_max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    crate::metrics::record_retry("rate_limit");
                    tokio::time::sleep(wait).await;
                    continue;
                }
            }

            let record = classify(
                status,
                &response.headers,
                &response.body,
                self.config.rate_limit_default_backoff,
            );
            match record.kind {
                ErrorKind::Server | ErrorKind::RateLimit | ErrorKind::Authentication => {
                    warn!(status, kind = %record.kind, message = %record.message, "request failed")
                }
                _ => debug!(status, kind = %record.kind, message = %record.message, "request failed"),
            }
            return Err(record);
        }
    }

    /// Execute `descriptor` and decode the body into `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, descriptor: &RequestDescriptor) -> Result<T> {
        let value = self.execute(descriptor).await?;
        T::deserialize(value.as_ref()).map_err(|e| {
            ErrorRecord::invalid_response(format!("unexpected response shape: {e}"))
        })
    }

    /// Drop cached responses; returns how many entries were removed.
    pub async fn invalidate(&self, invalidation: &Invalidation) -> usize {
        self.cache.invalidate(invalidation).await
    }

    async fn refresh_for(&self, credentials: &AttachedCredentials) -> Result<String> {
        let token = match (&credentials.cookie, credentials.overridden) {
            (Some(cookie), true) => self.session.refresh_detached(cookie).await?,
            _ => self.session.refresh_after(credentials.generation).await?,
        };
        Ok(token)
    }

    async fn send(
        &self,
        descriptor: &RequestDescriptor,
        url: &Url,
        credentials: &AttachedCredentials,
    ) -> Result<RawResponse> {
        let mut request = self
            .http
            .request(descriptor.method().clone(), url.clone())
            .headers(credentials.to_headers()?)
            .timeout(self.config.timeout);

        if let Some(body) = descriptor.body() {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        } else if descriptor.is_mutating() {
            request = request.body(Vec::<u8>::new());
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                crate::metrics::record_request(
                    descriptor.service(),
                    ErrorKind::Network.label(),
                    started.elapsed().as_secs_f64(),
                );
                warn!(error = %e, timeout = e.is_timeout(), "upstream request failed");
                return Err(network_error(&e));
            }
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| {
            warn!(status, error = %e, "failed to read upstream response body");
            network_error(&e)
        })?;

        crate::metrics::record_request(
            descriptor.service(),
            &status.to_string(),
            started.elapsed().as_secs_f64(),
        );
        debug!(status, bytes = body.len(), "upstream responded");

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

fn network_error(e: &reqwest::Error) -> ErrorRecord {
    if e.is_timeout() {
        ErrorRecord::network(format!("upstream timed out: {e}"))
    } else {
        ErrorRecord::network(format!("upstream unreachable: {e}"))
    }
}

/// Empty success bodies decode to `null`.
fn decode_body(status: u16, body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| {
        ErrorRecord::invalid_response(format!("response body is not JSON: {e}"))
            .with_status(status)
            .with_body(body)
    })
}
