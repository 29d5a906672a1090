//! Logical service name → base URL lookup
//!
//! Upstream exposes each API family as an independently versioned domain, so
//! callers address endpoints by `(service, path)` and the router supplies the
//! host and version prefix.

use std::collections::HashMap;

use url::Url;

use crate::error::{ErrorRecord, Result};

/// The fixed service table.
pub const DEFAULT_SERVICES: &[(&str, &str)] = &[
    ("Users", "https://users.roblox.com/v1"),
    ("Presence", "https://presence.roblox.com/v1"),
    ("Groups", "https://groups.roblox.com/v1"),
    ("GroupsV2", "https://groups.roblox.com/v2"),
    ("Badges", "https://badges.roblox.com/v1"),
    ("Inventory", "https://inventory.roblox.com/v1"),
    ("InventoryV2", "https://inventory.roblox.com/v2"),
    ("Avatar", "https://avatar.roblox.com/v1"),
    ("AvatarV2", "https://avatar.roblox.com/v2"),
    ("Thumbnails", "https://thumbnails.roblox.com/v1"),
    ("Friends", "https://friends.roblox.com/v1"),
    ("AccountSettings", "https://accountsettings.roblox.com/v1"),
    ("PremiumFeatures", "https://premiumfeatures.roblox.com/v1"),
    ("Games", "https://games.roblox.com/v1"),
    ("GamesV2", "https://games.roblox.com/v2"),
    ("Auth", "https://auth.roblox.com/v2"),
];

/// Service that mints anti-forgery tokens.
pub const AUTH_SERVICE: &str = "Auth";

#[derive(Debug, Clone)]
pub struct ServiceRouter {
    routes: HashMap<String, String>,
}

impl Default for ServiceRouter {
    fn default() -> Self {
        Self {
            routes: DEFAULT_SERVICES
                .iter()
                .map(|(name, base)| (name.to_string(), base.to_string()))
                .collect(),
        }
    }
}

impl ServiceRouter {
    /// Route every known service under one root as `{root}/{lowercase name}`.
    ///
    /// Points a whole client at a single host, e.g. a local mock upstream.
    pub fn rebased(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            routes: DEFAULT_SERVICES
                .iter()
                .map(|(name, _)| (name.to_string(), format!("{root}/{}", name.to_lowercase())))
                .collect(),
        }
    }

    /// Replace (or register) the base URL for one service.
    pub fn with_override(mut self, service: impl Into<String>, base: impl Into<String>) -> Self {
        self.routes.insert(service.into(), base.into());
        self
    }

    /// Base URL for `service`, or `UnknownService` if it isn't registered.
    pub fn resolve(&self, service: &str) -> Result<&str> {
        self.routes
            .get(service)
            .map(String::as_str)
            .ok_or_else(|| ErrorRecord::unknown_service(service))
    }

    /// Full URL for `path` on `service` with `params` appended in order.
    pub fn url_for(&self, service: &str, path: &str, params: &[(String, String)]) -> Result<Url> {
        let base = self.resolve(service)?.trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        let mut url = Url::parse(&joined).map_err(|e| {
            ErrorRecord::unknown_service(service)
                .with_message(format!("service {service} has an invalid base URL: {e}"))
        })?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    /// Registered service names, sorted.
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
