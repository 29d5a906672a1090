//! Upstream failure classification
//!
//! Pure functions from (status, headers, body) to an `ErrorRecord`. The
//! executor consults `is_csrf_rejection` and the 429 status before calling
//! `classify`, so by the time a response reaches `classify` it is terminal.

use std::time::Duration;

use blox_session::CSRF_HEADER;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::{ErrorKind, ErrorRecord};

/// Whether a response is an anti-forgery rejection: 403 carrying a fresh
/// token header. A plain 403 is a permission failure.
pub fn is_csrf_rejection(status: u16, headers: &HeaderMap) -> bool {
    status == 403 && headers.contains_key(CSRF_HEADER)
}

/// Parse `Retry-After` as delta-seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Best-effort human message from an upstream error body.
///
/// Upstream error bodies look like `{"errors":[{"code":3,"message":"..."}]}`;
/// some endpoints use a top-level `message` instead.
pub fn upstream_message(status: u16, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let nested = json
            .get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str());
        let top = json.get("message").and_then(|m| m.as_str());
        if let Some(msg) = nested.or(top).filter(|m| !m.is_empty()) {
            return msg.to_string();
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("upstream returned {status}"))
}

/// Map a status code to its error kind.
///
/// 403 with an anti-forgery header only reaches here after the single
/// refresh-and-retry was spent, so it is an authentication failure.
pub fn kind_for_status(status: u16, headers: &HeaderMap) -> ErrorKind {
    match status {
        401 => ErrorKind::Authentication,
        403 if is_csrf_rejection(status, headers) => ErrorKind::Authentication,
        403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        429 => ErrorKind::RateLimit,
        400..=499 => ErrorKind::Validation,
        _ => ErrorKind::Server,
    }
}

/// Classify a terminal non-2xx response.
///
/// `default_backoff` fills `retry_after` for a 429 that didn't send one.
pub fn classify(
    status: u16,
    headers: &HeaderMap,
    body: &str,
    default_backoff: Duration,
) -> ErrorRecord {
    let kind = kind_for_status(status, headers);
    let mut record = ErrorRecord::new(kind, upstream_message(status, body)).with_status(status);
    if !body.is_empty() {
        record = record.with_body(body);
    }
    if kind == ErrorKind::RateLimit {
        record = record.with_retry_after(parse_retry_after(headers).unwrap_or(default_backoff));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const BACKOFF: Duration = Duration::from_secs(1);

    fn csrf_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CSRF_HEADER, HeaderValue::from_static("fresh"));
        headers
    }

    #[test]
    fn csrf_rejection_needs_403_and_header() {
        assert!(is_csrf_rejection(403, &csrf_headers()));
        assert!(!is_csrf_rejection(403, &HeaderMap::new()));
        assert!(!is_csrf_rejection(401, &csrf_headers()));
    }

    #[test]
    fn status_401_is_authentication() {
        let err = classify(401, &HeaderMap::new(), "", BACKOFF);
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.status, Some(401));
        assert_eq!(err.message, "Unauthorized");
    }

    #[test]
    fn plain_403_is_permission() {
        let body = r#"{"errors":[{"code":0,"message":"Authorization has been denied for this request."}]}"#;
        let err = classify(403, &HeaderMap::new(), body, BACKOFF);
        assert_eq!(err.kind, ErrorKind::Permission);
        assert_eq!(err.message, "Authorization has been denied for this request.");
        assert_eq!(err.body.as_deref(), Some(body));
    }

    #[test]
    fn terminal_csrf_rejection_is_authentication() {
        let body = r#"{"errors":[{"code":0,"message":"Token Validation Failed"}]}"#;
        let err = classify(403, &csrf_headers(), body, BACKOFF);
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.message, "Token Validation Failed");
    }

    #[test]
    fn status_404_is_not_found() {
        let body = r#"{"errors":[{"code":3,"message":"The user id is invalid."}]}"#;
        let err = classify(404, &HeaderMap::new(), body, BACKOFF);
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message, "The user id is invalid.");
    }

    #[test]
    fn client_errors_are_validation() {
        for status in [400, 422, 409, 405] {
            let err = classify(status, &HeaderMap::new(), r#"{"message":"bad"}"#, BACKOFF);
            assert_eq!(err.kind, ErrorKind::Validation, "status {status}");
            assert_eq!(err.message, "bad");
        }
    }

    #[test]
    fn server_errors_are_server() {
        for status in [500, 502, 503, 504] {
            assert_eq!(
                classify(status, &HeaderMap::new(), "", BACKOFF).kind,
                ErrorKind::Server,
                "status {status}"
            );
        }
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        let err = classify(429, &headers, "", BACKOFF);
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
    }

    #[test]
    fn rate_limit_without_header_uses_default() {
        let err = classify(429, &HeaderMap::new(), "", BACKOFF);
        assert_eq!(err.retry_after, Some(BACKOFF));
    }

    #[test]
    fn unparseable_retry_after_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn message_falls_back_to_raw_body() {
        assert_eq!(upstream_message(500, "  upstream exploded \n"), "upstream exploded");
    }

    #[test]
    fn message_falls_back_to_status_reason() {
        assert_eq!(upstream_message(503, ""), "Service Unavailable");
        assert_eq!(upstream_message(599, ""), "upstream returned 599");
    }

    #[test]
    fn classification_is_deterministic() {
        let body = r#"{"errors":[{"message":"x"}]}"#;
        assert_eq!(
            classify(404, &HeaderMap::new(), body, BACKOFF),
            classify(404, &HeaderMap::new(), body, BACKOFF)
        );
    }
}
