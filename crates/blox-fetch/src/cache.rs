//! In-memory response cache keyed by request fingerprint
//!
//! Entries are immutable `Arc<CacheEntry>` values; `put` replaces the whole
//! entry, so a reader never observes a half-written one. Expiry is checked
//! lazily at read time: an expired entry is reported as a miss and evicted.
//! Concurrent writers to the same fingerprint are last-write-wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::descriptor::Fingerprint;

/// One cached response.
#[derive(Debug)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub value: Arc<Value>,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// What to drop from the cache.
#[derive(Debug, Clone)]
pub enum Invalidation {
    /// Exactly this fingerprint
    Exact(Fingerprint),
    /// Every fingerprint whose text form starts with this string
    Prefix(String),
}

pub struct CacheStore {
    entries: RwLock<HashMap<Fingerprint, Arc<CacheEntry>>>,
    default_ttl: Duration,
    enabled: bool,
}

impl CacheStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            enabled: true,
        }
    }

    /// A store that never holds anything; every lookup misses.
    pub fn disabled() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl: Duration::ZERO,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Live value for `fingerprint`, or `None` when absent or expired.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<Value>> {
        let now = Instant::now();
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(fingerprint) {
                Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
                Some(entry) => entry.clone(),
                None => return None,
            }
        };

        // Evict unless a writer already replaced it
        let mut entries = self.entries.write().await;
        if entries
            .get(fingerprint)
            .is_some_and(|current| Arc::ptr_eq(current, &expired))
        {
            entries.remove(fingerprint);
            debug!(%fingerprint, "evicted expired cache entry");
        }
        None
    }

    /// Store `value` under `fingerprint` for `ttl`, replacing any entry.
    pub async fn put(&self, fingerprint: Fingerprint, value: Arc<Value>, ttl: Duration) {
        if !self.enabled || ttl.is_zero() {
            return;
        }
        let entry = Arc::new(CacheEntry {
            fingerprint: fingerprint.clone(),
            value,
            expires_at: Instant::now() + ttl,
        });
        self.entries.write().await.insert(fingerprint, entry);
    }

    /// Drop matching entries; returns how many were removed.
    pub async fn invalidate(&self, invalidation: &Invalidation) -> usize {
        let mut entries = self.entries.write().await;
        let removed = match invalidation {
            Invalidation::Exact(fingerprint) => usize::from(entries.remove(fingerprint).is_some()),
            Invalidation::Prefix(prefix) => {
                let before = entries.len();
                entries.retain(|fingerprint, _| !fingerprint.as_str().starts_with(prefix.as_str()));
                before - entries.len()
            }
        };
        debug!(?invalidation, removed, "cache invalidated");
        removed
    }

    /// Evict every expired entry; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Stored entries, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
