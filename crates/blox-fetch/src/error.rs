//! Error taxonomy for request execution
//!
//! Every terminal failure surfaces as an `ErrorRecord` tagged with one
//! `ErrorKind`. Callers match on `kind`; the record keeps the upstream status,
//! message and raw body for diagnostics.

use std::fmt;
use std::time::Duration;

/// Closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 401, or a second anti-forgery rejection after a refresh
    Authentication,
    /// 403 without anti-forgery semantics
    Permission,
    /// 404
    NotFound,
    /// 400/422 and other client errors; carries the upstream message
    Validation,
    /// 429 after the retry ceiling; carries the retry interval
    RateLimit,
    /// 5xx
    Server,
    /// No response received (connect failure, timeout, truncated body)
    Network,
    /// Local routing failure, never reaches the network
    UnknownService,
    /// A successful response whose body could not be decoded into the
    /// expected shape
    InvalidResponse,
}

impl ErrorKind {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Permission => "permission",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Server => "server",
            ErrorKind::Network => "network",
            ErrorKind::UnknownService => "unknown_service",
            ErrorKind::InvalidResponse => "invalid_response",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified, immutable request failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    pub message: String,
    /// Raw upstream body, when one was received
    pub body: Option<String>,
    /// Interval upstream asked us to wait (rate limiting only)
    pub retry_after: Option<Duration>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            body: None,
            retry_after: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn unknown_service(service: &str) -> Self {
        Self::new(
            ErrorKind::UnknownService,
            format!("service {service} is not registered"),
        )
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Shorthand for `self.kind == kind`.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<blox_session::Error> for ErrorRecord {
    fn from(err: blox_session::Error) -> Self {
        match err {
            blox_session::Error::Http(msg) => ErrorRecord::network(msg),
            blox_session::Error::MissingToken { status } => ErrorRecord::new(
                ErrorKind::Authentication,
                format!("anti-forgery token refresh failed (upstream returned {status})"),
            )
            .with_status(status),
            blox_session::Error::InvalidCredential(msg) => {
                ErrorRecord::new(ErrorKind::Authentication, msg)
            }
        }
    }
}

/// Result alias for request execution.
pub type Result<T> = std::result::Result<T, ErrorRecord>;
