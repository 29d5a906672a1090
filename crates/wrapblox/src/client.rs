//! Client context
//!
//! `WrapBlox` owns one `Fetcher` (and through it one session and one cache).
//! Entity operations are split by upstream area across `users`, `friends` and
//! `games`; this module holds construction, login and the top-level lookups.

use blox_fetch::{FetchConfig, Fetcher, RequestDescriptor, RequestOptions, ServiceRouter};
use common::Secret;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{Badge, Group, Lookup, Universe, User};

#[derive(Deserialize)]
pub(crate) struct IdOnly {
    pub(crate) id: u64,
}

#[derive(Deserialize)]
pub(crate) struct DataList<T> {
    pub(crate) data: Vec<T>,
}

#[derive(Deserialize)]
pub(crate) struct Count {
    pub(crate) count: u64,
}

pub struct WrapBlox {
    fetcher: Fetcher,
    me: RwLock<Option<User>>,
}

impl WrapBlox {
    /// Client with default configuration against the public upstream.
    pub fn new() -> Result<Self> {
        Self::with_config(&ClientConfig::default())
    }

    pub fn with_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Self::from_parts(config.router(), config.fetch_config())
    }

    pub fn from_parts(router: ServiceRouter, config: FetchConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(router, config)?,
            me: RwLock::new(None),
        })
    }

    /// The underlying request core, for endpoints the facade doesn't wrap.
    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Install `cookie` as the primary credential and resolve who it belongs
    /// to. On failure the credential is removed again.
    #[instrument(skip_all)]
    pub async fn login(&self, cookie: impl Into<Secret<String>>) -> Result<User> {
        let session = self.fetcher.session();
        session.login(cookie.into()).await?;

        match self.resolve_authenticated(None).await {
            Ok(user) => {
                info!(user_id = user.id, "logged in");
                *self.me.write().await = Some(user.clone());
                Ok(user)
            }
            Err(e) => {
                session.logout().await;
                *self.me.write().await = None;
                Err(e)
            }
        }
    }

    pub async fn logout(&self) {
        self.fetcher.session().logout().await;
        *self.me.write().await = None;
    }

    pub async fn is_logged_in(&self) -> bool {
        self.me.read().await.is_some()
    }

    /// The logged-in user, if any.
    pub async fn me(&self) -> Option<User> {
        self.me.read().await.clone()
    }

    /// Resolve the user behind `cookie` without touching the client's own
    /// session.
    pub async fn fetch_authenticated(&self, cookie: impl Into<Secret<String>>) -> Result<User> {
        let cookie = cookie.into();
        if cookie.is_blank() {
            return Err(blox_session::Error::InvalidCredential("credential is empty".into()).into());
        }
        self.resolve_authenticated(Some(cookie)).await
    }

    async fn resolve_authenticated(&self, cookie: Option<Secret<String>>) -> Result<User> {
        let mut options = RequestOptions::new().use_cache(false);
        if let Some(cookie) = cookie {
            options = options.cookie(cookie);
        }
        let who: IdOnly = self
            .fetcher
            .fetch(&RequestDescriptor::get("Users", "/users/authenticated", options))
            .await?;
        self.fetch_user(who.id).await
    }

    /// Fetch a user by id, or by exact username (resolved to an id first).
    #[instrument(skip_all)]
    pub async fn fetch_user(&self, query: impl Into<Lookup>) -> Result<User> {
        let id = match query.into() {
            Lookup::Id(id) => id,
            Lookup::Name(name) => self.user_id_by_name(&name).await?,
        };
        let user = self
            .fetcher
            .fetch(&RequestDescriptor::get(
                "Users",
                format!("/users/{id}"),
                RequestOptions::default(),
            ))
            .await?;
        Ok(user)
    }

    async fn user_id_by_name(&self, name: &str) -> Result<u64> {
        let body = serde_json::json!({ "usernames": [name], "excludeBannedUsers": false });
        let found: DataList<IdOnly> = self
            .fetcher
            .fetch(&RequestDescriptor::post(
                "Users",
                "/usernames/users",
                RequestOptions::new().body(body),
            ))
            .await?;
        found
            .data
            .first()
            .map(|user| user.id)
            .ok_or_else(|| Error::NotFound(format!("user {name}")))
    }

    /// Fetch a group by id, or by exact name (resolved to an id first).
    #[instrument(skip_all)]
    pub async fn fetch_group(&self, query: impl Into<Lookup>) -> Result<Group> {
        let id = match query.into() {
            Lookup::Id(id) => id,
            Lookup::Name(name) => {
                let found: DataList<IdOnly> = self
                    .fetcher
                    .fetch(&RequestDescriptor::get(
                        "Groups",
                        "/groups/search/lookup",
                        RequestOptions::new().param("groupName", &name),
                    ))
                    .await?;
                found
                    .data
                    .first()
                    .map(|group| group.id)
                    .ok_or_else(|| Error::NotFound(format!("group {name}")))?
            }
        };

        let groups: DataList<Group> = self
            .fetcher
            .fetch(&RequestDescriptor::get(
                "GroupsV2",
                "/groups",
                RequestOptions::new().param("groupIds", id),
            ))
            .await?;
        groups
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("group {id}")))
    }

    pub async fn fetch_badge(&self, badge_id: u64) -> Result<Badge> {
        let badge = self
            .fetcher
            .fetch(&RequestDescriptor::get(
                "Badges",
                format!("/badges/{badge_id}"),
                RequestOptions::default(),
            ))
            .await?;
        Ok(badge)
    }

    pub async fn fetch_universe(&self, universe_id: u64) -> Result<Universe> {
        let universes: DataList<Universe> = self
            .fetcher
            .fetch(&RequestDescriptor::get(
                "Games",
                "/games",
                RequestOptions::new().param("universeIds", universe_id),
            ))
            .await?;
        universes
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("universe {universe_id}")))
    }

    pub(crate) async fn require_login(&self) -> Result<()> {
        if self.fetcher.session().is_authenticated().await {
            Ok(())
        } else {
            Err(Error::NotLoggedIn)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Hits};
    use axum::Json;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use blox_fetch::ErrorKind;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    fn builderman() -> Value {
        json!({
            "id": 156,
            "name": "builderman",
            "displayName": "builderman",
            "description": "",
            "hasVerifiedBadge": true,
            "isBanned": false,
            "created": "2006-02-27T21:06:40.3Z"
        })
    }

    fn users_app(hits: &Hits) -> axum::Router {
        let (by_id, by_name, me) = (hits.clone(), hits.clone(), hits.clone());
        axum::Router::new()
            .route(
                "/users/users/156",
                get(move || {
                    by_id.hit("user");
                    async { Json(builderman()) }
                }),
            )
            .route(
                "/users/usernames/users",
                post(move |Json(body): Json<Value>| {
                    by_name.hit("lookup");
                    async move {
                        let data = if body["usernames"][0] == "builderman" {
                            json!([{"requestedUsername": "builderman", "id": 156, "name": "builderman"}])
                        } else {
                            json!([])
                        };
                        Json(json!({ "data": data }))
                    }
                }),
            )
            .route(
                "/users/users/authenticated",
                get(move |headers: HeaderMap| {
                    me.hit("authenticated");
                    async move {
                        match headers.get("cookie").and_then(|v| v.to_str().ok()) {
                            Some(".ROBLOSECURITY=good") | Some(".ROBLOSECURITY=alt") => {
                                Json(json!({"id": 156, "name": "builderman"})).into_response()
                            }
                            _ => (
                                StatusCode::UNAUTHORIZED,
                                Json(json!({"errors": [{"code": 0, "message": "Authorization has been denied for this request."}]})),
                            )
                                .into_response(),
                        }
                    }
                }),
            )
    }

    #[tokio::test]
    async fn fetch_user_by_id() {
        let hits = Hits::default();
        let client = test_support::client(&test_support::spawn(users_app(&hits)).await);

        let user = client.fetch_user(156).await.unwrap();
        assert_eq!(user.name, "builderman");
        assert_eq!(hits.get("user"), 1);
        assert_eq!(hits.get("lookup"), 0);
    }

    #[tokio::test]
    async fn fetch_user_by_name_resolves_then_fetches() {
        let hits = Hits::default();
        let client = test_support::client(&test_support::spawn(users_app(&hits)).await);

        let user = client.fetch_user("builderman").await.unwrap();
        assert_eq!(user.id, 156);
        assert_eq!(hits.get("lookup"), 1);
        assert_eq!(hits.get("user"), 1);

        // Both steps are cached
        client.fetch_user("builderman").await.unwrap();
        assert_eq!(hits.get("lookup"), 1);
        assert_eq!(hits.get("user"), 1);
    }

    #[tokio::test]
    async fn unknown_username_is_not_found() {
        let hits = Hits::default();
        let client = test_support::client(&test_support::spawn(users_app(&hits)).await);

        let err = client.fetch_user("nobody_here").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref what) if what == "user nobody_here"));
        assert_eq!(hits.get("user"), 0);
    }

    #[tokio::test]
    async fn login_records_identity() {
        let hits = Hits::default();
        let client = test_support::client(&test_support::spawn(users_app(&hits)).await);
        assert!(!client.is_logged_in().await);

        let me = client.login("good").await.unwrap();
        assert_eq!(me.id, 156);
        assert!(client.is_logged_in().await);
        assert_eq!(client.me().await.map(|u| u.id), Some(156));

        client.logout().await;
        assert!(!client.is_logged_in().await);
        assert!(!client.fetcher().session().is_authenticated().await);
    }

    #[tokio::test]
    async fn rejected_login_leaves_client_logged_out() {
        let hits = Hits::default();
        let client = test_support::client(&test_support::spawn(users_app(&hits)).await);

        let err = client.login("expired").await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Authentication));
        assert!(!client.is_logged_in().await);
        assert!(!client.fetcher().session().is_authenticated().await);
    }

    #[tokio::test]
    async fn blank_login_rejected_locally() {
        let client = test_support::client("http://127.0.0.1:9");
        let err = client.login("").await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Authentication));
    }

    #[tokio::test]
    async fn fetch_authenticated_uses_override_only() {
        let hits = Hits::default();
        let client = test_support::client(&test_support::spawn(users_app(&hits)).await);

        let user = client.fetch_authenticated("alt").await.unwrap();
        assert_eq!(user.id, 156);
        assert!(!client.is_logged_in().await);
        assert!(!client.fetcher().session().is_authenticated().await);
    }

    fn groups_app(hits: &Hits) -> axum::Router {
        let (lookup, by_id) = (hits.clone(), hits.clone());
        axum::Router::new()
            .route(
                "/groups/groups/search/lookup",
                get(move |Query(q): Query<HashMap<String, String>>| {
                    lookup.hit("lookup");
                    async move {
                        let data = match q.get("groupName").map(String::as_str) {
                            Some("Roblox") => json!([{"id": 1200769, "name": "Roblox", "memberCount": 1}]),
                            _ => json!([]),
                        };
                        Json(json!({ "data": data }))
                    }
                }),
            )
            .route(
                "/groupsv2/groups",
                get(move |Query(q): Query<HashMap<String, String>>| {
                    by_id.hit("group");
                    async move {
                        let data = match q.get("groupIds").map(String::as_str) {
                            Some("1200769") => json!([{"id": 1200769, "name": "Roblox", "description": "Official", "hasVerifiedBadge": true}]),
                            _ => json!([]),
                        };
                        Json(json!({ "data": data }))
                    }
                }),
            )
    }

    #[tokio::test]
    async fn fetch_group_by_name_is_two_steps() {
        let hits = Hits::default();
        let client = test_support::client(&test_support::spawn(groups_app(&hits)).await);

        let group = client.fetch_group("Roblox").await.unwrap();
        assert_eq!(group.id, 1200769);
        assert!(group.has_verified_badge);
        assert_eq!(hits.get("lookup"), 1);
        assert_eq!(hits.get("group"), 1);
    }

    #[tokio::test]
    async fn missing_group_is_not_found() {
        let hits = Hits::default();
        let client = test_support::client(&test_support::spawn(groups_app(&hits)).await);

        assert!(matches!(
            client.fetch_group(42).await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            client.fetch_group("Nonexistent").await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert_eq!(hits.get("group"), 1, "name miss never reaches the id lookup");
    }

    #[tokio::test]
    async fn badge_and_universe_lookups() {
        let app = axum::Router::new()
            .route(
                "/badges/badges/2124445684",
                get(|| async { Json(json!({"id": 2124445684u64, "name": "Welcome", "enabled": true})) }),
            )
            .route(
                "/badges/badges/1",
                get(|| async {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({"errors": [{"code": 1, "message": "Badge is invalid or does not exist."}]})),
                    )
                }),
            )
            .route(
                "/games/games",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let data = match q.get("universeIds").map(String::as_str) {
                        Some("13058") => json!([{"id": 13058, "rootPlaceId": 1818, "name": "Classic: Crossroads", "playing": 12}]),
                        _ => json!([]),
                    };
                    Json(json!({ "data": data }))
                }),
            );
        let client = test_support::client(&test_support::spawn(app).await);

        let badge = client.fetch_badge(2124445684).await.unwrap();
        assert!(badge.enabled);

        let err = client.fetch_badge(1).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));

        let universe = client.fetch_universe(13058).await.unwrap();
        assert_eq!(universe.root_place_id, Some(1818));
        assert_eq!(universe.playing, 12);

        assert!(matches!(
            client.fetch_universe(1).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = ClientConfig::default();
        config.pagination.page_size = 7;
        assert!(matches!(
            WrapBlox::with_config(&config),
            Err(Error::Config(_))
        ));
    }
}
