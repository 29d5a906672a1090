//! Session state and single-flight anti-forgery refresh
//!
//! The session holds the primary credential and the anti-forgery token for
//! one client context. The token moves through a small state machine:
//!
//! - `Unknown` (no token yet, or the last one was rejected)
//! - `Fresh` (token set, believed valid)
//!
//! A rejection observed by any in-flight request moves `Fresh` back to
//! `Unknown`. Every token carries a generation number; a caller that asks for
//! a refresh passes the generation it was rejected with. The refresh mutex
//! admits one minter at a time, and a caller that finds a newer generation
//! already in place reuses that token instead of minting again. A caller that
//! queued behind a failed mint gets that failure back. Concurrent rejections
//! therefore collapse into exactly one upstream mint, whatever its outcome.
//!
//! `login` and `logout` bump the generation. A mint that was in flight across
//! either is handed to its caller but never installed.

use std::time::Duration;

use common::Secret;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::constants::{CSRF_HEADER, cookie_header_value};
use crate::error::{Error, Result};
use crate::mint::mint_token;

/// Observable state of the anti-forgery token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Unknown,
    Fresh,
}

#[derive(Debug, Default)]
struct TokenSlot {
    token: Option<String>,
    generation: u64,
    /// Completed mint attempts for the primary identity
    attempts: u64,
    /// Failure of the most recent attempt, if it failed
    last_error: Option<Error>,
}

/// Credentials attached to one outgoing request.
///
/// `generation` records which token generation was attached so a later
/// rejection can be matched against the refresh that superseded it.
#[derive(Debug, Clone)]
pub struct AttachedCredentials {
    pub cookie: Option<Secret<String>>,
    pub csrf_token: Option<String>,
    pub generation: u64,
    /// True when the cookie came from a per-request override
    pub overridden: bool,
}

impl AttachedCredentials {
    /// Replace the anti-forgery token (used for the single post-refresh retry).
    pub fn with_csrf_token(mut self, token: String) -> Self {
        self.csrf_token = Some(token);
        self
    }

    /// Render the attached credentials as request headers.
    pub fn to_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &self.cookie {
            let value = HeaderValue::from_str(&cookie_header_value(cookie.expose_str()))
                .map_err(|e| Error::InvalidCredential(e.to_string()))?;
            headers.insert(COOKIE, value);
        }
        if let Some(token) = &self.csrf_token {
            let value = HeaderValue::from_str(token)
                .map_err(|e| Error::InvalidCredential(format!("anti-forgery token: {e}")))?;
            headers.insert(HeaderName::from_static(CSRF_HEADER), value);
        }
        Ok(headers)
    }
}

/// Session manager for one authenticated client context.
pub struct Session {
    credential: RwLock<Option<Secret<String>>>,
    token: RwLock<TokenSlot>,
    refresh_lock: Mutex<()>,
    http_client: reqwest::Client,
    mint_url: String,
    timeout: Duration,
}

impl Session {
    /// Create an unauthenticated session that mints tokens at `mint_url`.
    pub fn new(http_client: reqwest::Client, mint_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            credential: RwLock::new(None),
            token: RwLock::new(TokenSlot::default()),
            refresh_lock: Mutex::new(()),
            http_client,
            mint_url: mint_url.into(),
            timeout,
        }
    }

    /// Install the primary credential. Any previously minted token belonged to
    /// the old identity and is dropped.
    pub async fn login(&self, cookie: Secret<String>) -> Result<()> {
        if cookie.is_blank() {
            return Err(Error::InvalidCredential("credential is empty".into()));
        }
        *self.credential.write().await = Some(cookie);
        self.reset_token().await;
        info!("session credential installed");
        Ok(())
    }

    /// Clear the primary credential and the token.
    pub async fn logout(&self) {
        *self.credential.write().await = None;
        self.reset_token().await;
        info!("session credential cleared");
    }

    /// Whether a primary credential is currently set.
    pub async fn is_authenticated(&self) -> bool {
        self.credential.read().await.is_some()
    }

    pub async fn token_state(&self) -> TokenState {
        if self.token.read().await.token.is_some() {
            TokenState::Fresh
        } else {
            TokenState::Unknown
        }
    }

    /// Credentials for one request. An override cookie takes precedence over
    /// the primary credential and never receives the shared token, which
    /// belongs to the primary identity.
    pub async fn attach(
        &self,
        cookie_override: Option<&Secret<String>>,
        mutating: bool,
    ) -> AttachedCredentials {
        let slot = self.token.read().await;
        if let Some(cookie) = cookie_override {
            return AttachedCredentials {
                cookie: Some(cookie.clone()),
                csrf_token: None,
                generation: slot.generation,
                overridden: true,
            };
        }

        AttachedCredentials {
            cookie: self.credential.read().await.clone(),
            csrf_token: if mutating { slot.token.clone() } else { None },
            generation: slot.generation,
            overridden: false,
        }
    }

    /// Mint a new token unconditionally and install it.
    pub async fn refresh(&self) -> Result<String> {
        let observed = self.token.read().await.generation;
        self.refresh_after(observed).await
    }

    /// Refresh after upstream rejected the token of generation `observed`.
    ///
    /// Marks that generation stale, then either joins the outcome of a mint
    /// that completed while this caller waited or performs the single
    /// upstream mint itself.
    pub async fn refresh_after(&self, observed: u64) -> Result<String> {
        let seen_attempts = self.mark_stale(observed).await;

        let _guard = self.refresh_lock.lock().await;
        let started_at = {
            let slot = self.token.read().await;
            if slot.attempts > seen_attempts {
                if let Some(err) = &slot.last_error {
                    debug!(observed, "joined failed token refresh");
                    return Err(err.clone());
                }
            }
            if slot.generation > observed {
                if let Some(token) = &slot.token {
                    debug!(
                        observed,
                        generation = slot.generation,
                        "joined completed token refresh"
                    );
                    return Ok(token.clone());
                }
            }
            slot.generation
        };

        let cookie = self.credential.read().await.clone();
        let minted = mint_token(&self.http_client, &self.mint_url, cookie.as_ref(), self.timeout).await;

        let mut slot = self.token.write().await;
        slot.attempts += 1;
        let token = match minted {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "anti-forgery token refresh failed");
                slot.last_error = Some(err.clone());
                return Err(err);
            }
        };
        slot.last_error = None;
        metrics::counter!("wrapblox_token_refresh_total").increment(1);

        if slot.generation != started_at {
            debug!("credential changed during refresh, token not installed");
            return Ok(token);
        }
        slot.token = Some(token.clone());
        slot.generation += 1;
        info!(generation = slot.generation, "anti-forgery token refreshed");
        Ok(token)
    }

    /// Mint a token for an override credential without touching shared state.
    pub async fn refresh_detached(&self, cookie: &Secret<String>) -> Result<String> {
        debug!("minting detached anti-forgery token for override credential");
        let token = mint_token(&self.http_client, &self.mint_url, Some(cookie), self.timeout).await?;
        metrics::counter!("wrapblox_token_refresh_total").increment(1);
        Ok(token)
    }

    /// Drop the token of generation `observed` if it is still installed, and
    /// return the number of completed mint attempts seen so far.
    async fn mark_stale(&self, observed: u64) -> u64 {
        let mut slot = self.token.write().await;
        if slot.generation == observed && slot.token.is_some() {
            slot.token = None;
            debug!(generation = observed, "anti-forgery token marked stale");
        }
        slot.attempts
    }

    async fn reset_token(&self) {
        let mut slot = self.token.write().await;
        slot.token = None;
        slot.generation += 1;
    }
}
