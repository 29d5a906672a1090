//! Request descriptors and cache fingerprints
//!
//! A `RequestDescriptor` is immutable once built. Its fingerprint is computed
//! at construction from the method, service, path, canonicalized query and a
//! hash of the body, and is the cache key for the response.
//!
//! Fingerprint text form:
//!
//! ```text
//! GET Users /users/1
//! GET Thumbnails /users/avatar?format=Png&userIds=1
//! POST Presence /presence/users#<sha256 of body, base64url>
//! ```
//!
//! Query pairs are sorted so parameter order never splits the cache.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use reqwest::Method;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Per-call options. Defaults: caching on, no override, no params, no body.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// When false, the call neither reads nor writes the cache
    pub use_cache: bool,
    /// Act as a different identity for this call only
    pub cookie: Option<Secret<String>>,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            cookie: None,
            params: Vec::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    pub fn cookie(mut self, cookie: Secret<String>) -> Self {
        self.cookie = Some(cookie);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Comma-joined list parameter, e.g. `userIds=1,2,3`.
    pub fn param_list<I, V>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let joined = values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.param(key, joined)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Cache key derived from a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    fn compute(
        method: &Method,
        service: &str,
        path: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Self {
        let mut key = prefix_for(method, service, path);

        if !params.is_empty() {
            let mut sorted: Vec<&(String, String)> = params.iter().collect();
            sorted.sort();
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(sorted.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .finish();
            key.push('?');
            key.push_str(&query);
        }

        if let Some(body) = body {
            let digest = Sha256::digest(body.to_string().as_bytes());
            key.push('#');
            key.push_str(&URL_SAFE_NO_PAD.encode(digest));
        }

        Fingerprint(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint prefix shared by every descriptor for `method service path`,
/// whatever its query or body. Use with `Invalidation::Prefix`.
pub fn prefix_for(method: &Method, service: &str, path: &str) -> String {
    format!("{method} {service} {path}")
}

/// Immutable description of one upstream call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    service: String,
    path: String,
    options: RequestOptions,
    fingerprint: Fingerprint,
}

impl RequestDescriptor {
    pub fn new(
        method: Method,
        service: impl Into<String>,
        path: impl Into<String>,
        options: RequestOptions,
    ) -> Self {
        let service = service.into();
        let path = path.into();
        let fingerprint = Fingerprint::compute(
            &method,
            &service,
            &path,
            &options.params,
            options.body.as_ref(),
        );
        Self {
            method,
            service,
            path,
            options,
            fingerprint,
        }
    }

    pub fn get(service: impl Into<String>, path: impl Into<String>, options: RequestOptions) -> Self {
        Self::new(Method::GET, service, path, options)
    }

    pub fn post(service: impl Into<String>, path: impl Into<String>, options: RequestOptions) -> Self {
        Self::new(Method::POST, service, path, options)
    }

    /// A new descriptor with `key` set to `value`, replacing any existing
    /// value for `key`.
    pub fn with_param(&self, key: &str, value: impl ToString) -> Self {
        let mut options = self.options.clone();
        let value = value.to_string();
        match options.params.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => options.params.push((key.to_string(), value)),
        }
        Self::new(self.method.clone(), self.service.clone(), self.path.clone(), options)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.options.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.options
            .params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&Value> {
        self.options.body.as_ref()
    }

    pub fn cookie(&self) -> Option<&Secret<String>> {
        self.options.cookie.as_ref()
    }

    pub fn cacheable(&self) -> bool {
        self.options.use_cache
    }

    /// Anything other than GET/HEAD/OPTIONS needs the anti-forgery token.
    pub fn is_mutating(&self) -> bool {
        ![Method::GET, Method::HEAD, Method::OPTIONS].contains(&self.method)
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}
