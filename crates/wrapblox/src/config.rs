//! Client configuration
//!
//! Path precedence: explicit path > `WRAPBLOX_CONFIG` env var > `wrapblox.toml`.
//! Every section is optional; an empty file equals `ClientConfig::default()`.
//! Credentials are never read from configuration, they go through
//! `WrapBlox::login`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use blox_fetch::router::DEFAULT_SERVICES;
use blox_fetch::{FetchConfig, ServiceRouter};
use serde::Deserialize;

/// Page sizes upstream list endpoints accept.
pub const ALLOWED_PAGE_SIZES: [u32; 4] = [10, 25, 50, 100];

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub pagination: PaginationConfig,
    /// Base URL overrides keyed by service name
    pub services: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts for a rate-limited request
    pub rate_limit_max_attempts: u32,
    pub rate_limit_default_backoff_ms: u64,
    /// Longest `Retry-After` honoured; longer waits fail with `RateLimit`
    pub rate_limit_max_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_size: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let defaults = FetchConfig::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            user_agent: defaults.user_agent,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rate_limit_max_attempts: 3,
            rate_limit_default_backoff_ms: 1000,
            rate_limit_max_backoff_ms: 60_000,
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

impl ClientConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> common::Result<Self> {
        let config: ClientConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> common::Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(common::Error::Config(
                "http.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.cache.ttl_secs == 0 {
            return Err(common::Error::Config(
                "cache.ttl_secs must be greater than 0".into(),
            ));
        }

        if self.retry.rate_limit_max_attempts == 0 {
            return Err(common::Error::Config(
                "retry.rate_limit_max_attempts must be at least 1".into(),
            ));
        }

        if self.retry.rate_limit_max_backoff_ms < self.retry.rate_limit_default_backoff_ms {
            return Err(common::Error::Config(
                "retry.rate_limit_max_backoff_ms must not be below rate_limit_default_backoff_ms"
                    .into(),
            ));
        }

        if !ALLOWED_PAGE_SIZES.contains(&self.pagination.page_size) {
            return Err(common::Error::Config(format!(
                "pagination.page_size must be one of {ALLOWED_PAGE_SIZES:?}, got: {}",
                self.pagination.page_size
            )));
        }

        for (name, base) in &self.services {
            if !DEFAULT_SERVICES.iter().any(|(known, _)| known == name) {
                return Err(common::Error::Config(format!(
                    "unknown service in [services]: {name}"
                )));
            }
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "services.{name} must start with http:// or https://, got: {base}"
                )));
            }
        }

        Ok(())
    }

    /// Resolve config file path from an explicit path or `WRAPBLOX_CONFIG`.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("WRAPBLOX_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("wrapblox.toml")
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.http.timeout_secs),
            user_agent: self.http.user_agent.clone(),
            cache_enabled: self.cache.enabled,
            cache_ttl: Duration::from_secs(self.cache.ttl_secs),
            rate_limit_max_attempts: self.retry.rate_limit_max_attempts,
            rate_limit_default_backoff: Duration::from_millis(
                self.retry.rate_limit_default_backoff_ms,
            ),
            rate_limit_max_backoff: Duration::from_millis(self.retry.rate_limit_max_backoff_ms),
            page_size: self.pagination.page_size,
        }
    }

    /// The default service table with `[services]` overrides applied.
    pub fn router(&self) -> ServiceRouter {
        self.services
            .iter()
            .fold(ServiceRouter::default(), |router, (name, base)| {
                router.with_override(name.clone(), base.clone())
            })
    }
}
