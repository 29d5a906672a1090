//! Mock upstream helpers for facade tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use blox_fetch::{FetchConfig, ServiceRouter};
use blox_session::CSRF_HEADER;
use serde_json::json;

use crate::client::WrapBlox;

/// Serve `app` on an ephemeral local port and return its root URL.
pub async fn spawn(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

/// Client with every service rebased under `root`.
pub fn client(root: &str) -> WrapBlox {
    let config = FetchConfig {
        timeout: Duration::from_secs(2),
        rate_limit_default_backoff: Duration::from_millis(10),
        ..FetchConfig::default()
    };
    WrapBlox::from_parts(ServiceRouter::rebased(root), config).unwrap()
}

/// Named call counters shared between a mock and its test.
#[derive(Clone, Default)]
pub struct Hits(Arc<Mutex<HashMap<&'static str, usize>>>);

impl Hits {
    pub fn hit(&self, name: &'static str) {
        *self.0.lock().unwrap().entry(name).or_default() += 1;
    }

    pub fn get(&self, name: &str) -> usize {
        self.0.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

/// Token the mock mint endpoint hands out.
pub const TOKEN: &str = "tok";

/// Identity endpoints `login` calls, plus token minting.
pub fn session_routes() -> axum::Router {
    axum::Router::new()
        .route(
            "/users/users/authenticated",
            get(|| async { Json(json!({"id": 156, "name": "builderman"})) }),
        )
        .route(
            "/users/users/156",
            get(|| async {
                Json(json!({"id": 156, "name": "builderman", "displayName": "builderman"}))
            }),
        )
        .route(
            "/auth/logout",
            post(|| async { (StatusCode::FORBIDDEN, [(CSRF_HEADER, TOKEN)]) }),
        )
}

/// Response of a mutating endpoint that only accepts the minted token.
pub fn require_token(headers: &HeaderMap) -> Response {
    match headers.get(CSRF_HEADER) {
        Some(v) if v == TOKEN => Json(json!({})).into_response(),
        _ => (StatusCode::FORBIDDEN, [(CSRF_HEADER, TOKEN)], "").into_response(),
    }
}
