//! Anti-forgery token minting
//!
//! Upstream hands out anti-forgery tokens as a side effect of rejecting a
//! mutating call: a POST without a valid token is answered with 403 and a
//! fresh token in the `x-csrf-token` response header. Minting therefore POSTs
//! an empty body to `TOKEN_MINT_PATH` on the `Auth` service and reads that
//! header, whatever the status.

use std::time::Duration;

use common::Secret;
use reqwest::header::COOKIE;
use tracing::debug;

use crate::constants::{CSRF_HEADER, cookie_header_value};
use crate::error::{Error, Result};

/// Mint a fresh anti-forgery token for `credential` (or for an anonymous
/// caller when `None`).
pub async fn mint_token(
    client: &reqwest::Client,
    mint_url: &str,
    credential: Option<&Secret<String>>,
    timeout: Duration,
) -> Result<String> {
    let mut request = client
        .post(mint_url)
        .body(Vec::<u8>::new())
        .timeout(timeout);
    if let Some(credential) = credential {
        if credential.is_blank() {
            return Err(Error::InvalidCredential("credential is empty".into()));
        }
        request = request.header(COOKIE, cookie_header_value(credential.expose_str()));
    }

    let response = request
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    let status = response.status().as_u16();
    let token = response
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    match token {
        Some(token) => {
            debug!(status, "minted anti-forgery token");
            Ok(token)
        }
        None => Err(Error::MissingToken { status }),
    }
}
