//! Error types for session operations

/// Errors from minting or attaching session credentials.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The mint request never produced a response (connect failure, timeout)
    #[error("token mint request failed: {0}")]
    Http(String),

    /// Upstream answered the mint request without an anti-forgery token
    #[error("upstream returned {status} without an anti-forgery token")]
    MissingToken { status: u16 },

    /// The credential cannot be placed in a header
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
