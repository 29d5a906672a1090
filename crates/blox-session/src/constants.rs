//! Header names and cookie layout used by upstream authentication

/// Cookie carrying the primary session credential
pub const SESSION_COOKIE_NAME: &str = ".ROBLOSECURITY";

/// Request/response header carrying the anti-forgery token
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Path, relative to the `Auth` service, that answers an empty POST with a
/// freshly minted anti-forgery token. Without a valid token the call is
/// rejected before it has any effect on the session.
pub const TOKEN_MINT_PATH: &str = "/logout";

/// Format the `Cookie` header value for a credential.
pub fn cookie_header_value(credential: &str) -> String {
    format!("{SESSION_COOKIE_NAME}={credential}")
}
