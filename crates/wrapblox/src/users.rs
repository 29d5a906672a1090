//! User-scoped operations: profile lists, counts, badges, inventory, blocking

use blox_fetch::{Invalidation, Method, RequestDescriptor, RequestOptions, descriptor::prefix_for};
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::{Count, WrapBlox};
use crate::error::Result;
use crate::models::{Badge, ItemType, Ownership, SortOrder, UserSummary};

#[derive(Deserialize)]
struct NameEntry {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AwardedDate {
    awarded_date: Option<String>,
}

impl WrapBlox {
    /// Previous usernames, newest first as upstream orders them.
    pub async fn username_history(&self, user_id: u64, max_results: usize) -> Result<Vec<String>> {
        let d = RequestDescriptor::get(
            "Users",
            format!("/users/{user_id}/username-history"),
            RequestOptions::default(),
        );
        let entries: Vec<NameEntry> = self.fetcher().fetch_envelope_list(&d, max_results).await?;
        Ok(entries.into_iter().map(|entry| entry.name).collect())
    }

    pub async fn followers(
        &self,
        user_id: u64,
        max_results: usize,
        sort: SortOrder,
    ) -> Result<Vec<UserSummary>> {
        self.user_list("followers", user_id, max_results, sort).await
    }

    pub async fn followings(
        &self,
        user_id: u64,
        max_results: usize,
        sort: SortOrder,
    ) -> Result<Vec<UserSummary>> {
        self.user_list("followings", user_id, max_results, sort).await
    }

    async fn user_list(
        &self,
        relation: &str,
        user_id: u64,
        max_results: usize,
        sort: SortOrder,
    ) -> Result<Vec<UserSummary>> {
        let d = RequestDescriptor::get(
            "Friends",
            format!("/users/{user_id}/{relation}"),
            RequestOptions::new().param("sortOrder", sort.as_str()),
        );
        Ok(self.fetcher().fetch_envelope_list(&d, max_results).await?)
    }

    pub async fn friend_count(&self, user_id: u64) -> Result<u64> {
        self.count("Friends", format!("/users/{user_id}/friends/count")).await
    }

    pub async fn follower_count(&self, user_id: u64) -> Result<u64> {
        self.count("Friends", format!("/users/{user_id}/followers/count")).await
    }

    pub async fn following_count(&self, user_id: u64) -> Result<u64> {
        self.count("Friends", format!("/users/{user_id}/followings/count")).await
    }

    pub(crate) async fn count(&self, service: &str, path: String) -> Result<u64> {
        let count: Count = self
            .fetcher()
            .fetch(&RequestDescriptor::get(service, path, RequestOptions::default()))
            .await?;
        Ok(count.count)
    }

    pub async fn user_badges(
        &self,
        user_id: u64,
        max_results: usize,
        sort: SortOrder,
    ) -> Result<Vec<Badge>> {
        let d = RequestDescriptor::get(
            "Badges",
            format!("/users/{user_id}/badges"),
            RequestOptions::new().param("sortOrder", sort.as_str()),
        );
        Ok(self.fetcher().fetch_envelope_list(&d, max_results).await?)
    }

    /// When `user_id` was awarded `badge_id`, or `None` if never.
    pub async fn badge_award_date(&self, user_id: u64, badge_id: u64) -> Result<Option<String>> {
        let awarded: Option<AwardedDate> = self
            .fetcher()
            .fetch(&RequestDescriptor::get(
                "Badges",
                format!("/users/{user_id}/badges/{badge_id}/awarded-date"),
                RequestOptions::default(),
            ))
            .await?;
        Ok(awarded.and_then(|a| a.awarded_date))
    }

    /// Whether `user_id` owns the item. A failed check is reported as
    /// `Ownership::Unknown` carrying the failure, never as `NotOwned`.
    pub async fn owns_asset(&self, user_id: u64, item_type: ItemType, asset_id: u64) -> Ownership {
        let d = RequestDescriptor::get(
            "Inventory",
            format!("/users/{user_id}/items/{}/{asset_id}/is-owned", item_type.as_str()),
            RequestOptions::default(),
        );
        match self.fetcher().fetch::<bool>(&d).await {
            Ok(true) => Ownership::Owned,
            Ok(false) => Ownership::NotOwned,
            Err(e) => {
                debug!(user_id, asset_id, kind = %e.kind, "ownership check failed");
                Ownership::Unknown(e)
            }
        }
    }

    /// `owns_asset` collapsed to a boolean: any failure reads as "not owned".
    pub async fn owns_asset_lossy(&self, user_id: u64, item_type: ItemType, asset_id: u64) -> bool {
        self.owns_asset(user_id, item_type, asset_id).await.is_owned()
    }

    pub async fn block(&self, user_id: u64) -> Result<()> {
        self.set_blocked(user_id, "block").await
    }

    pub async fn unblock(&self, user_id: u64) -> Result<()> {
        self.set_blocked(user_id, "unblock").await
    }

    async fn set_blocked(&self, user_id: u64, action: &str) -> Result<()> {
        self.require_login().await?;
        let d = RequestDescriptor::post(
            "AccountSettings",
            format!("/users/{user_id}/{action}"),
            RequestOptions::new().use_cache(false),
        );
        self.fetcher().execute(&d).await?;
        self.fetcher()
            .invalidate(&Invalidation::Prefix(prefix_for(
                &Method::GET,
                "Friends",
                &format!("/users/{user_id}/"),
            )))
            .await;
        info!(user_id, action, "block state changed");
        Ok(())
    }
}
