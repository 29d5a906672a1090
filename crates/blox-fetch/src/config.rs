//! Runtime knobs for the request core
//!
//! The facade crate deserializes these from TOML; this struct is the
//! already-validated form the fetcher consumes.

use std::time::Duration;

/// Default upstream page size for cursor-paged endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Bound on a single upstream call, including reading the body
    pub timeout: Duration,
    pub user_agent: String,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    /// Total attempts for a rate-limited request, first call included
    pub rate_limit_max_attempts: u32,
    /// Backoff used when a 429 carries no usable `Retry-After`
    pub rate_limit_default_backoff: Duration,
    /// Longest wait honoured before a retry; a longer `Retry-After` fails fast
    pub rate_limit_max_backoff: Duration,
    pub page_size: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("wrapblox/", env!("CARGO_PKG_VERSION")).to_string(),
            cache_enabled: true,
            cache_ttl: Duration::from_secs(300),
            rate_limit_max_attempts: 3,
            rate_limit_default_backoff: Duration::from_secs(1),
            rate_limit_max_backoff: Duration::from_secs(60),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
