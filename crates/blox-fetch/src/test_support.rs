//! Mock upstream helpers shared by the executor and pagination tests

use std::time::Duration;

use crate::config::FetchConfig;
use crate::executor::Fetcher;
use crate::router::ServiceRouter;

/// Serve `app` on an ephemeral local port and return its root URL.
pub async fn spawn(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

/// Short timeouts and backoff so failure paths finish quickly.
pub fn config() -> FetchConfig {
    FetchConfig {
        timeout: Duration::from_secs(2),
        rate_limit_default_backoff: Duration::from_millis(10),
        ..FetchConfig::default()
    }
}

/// Fetcher with every service rebased under `root` (see `ServiceRouter::rebased`),
/// so `Users` lives at `{root}/users` and the mint endpoint at `{root}/auth/logout`.
pub fn fetcher(root: &str) -> Fetcher {
    fetcher_with(root, config())
}

pub fn fetcher_with(root: &str, config: FetchConfig) -> Fetcher {
    Fetcher::new(ServiceRouter::rebased(root), config).unwrap()
}
