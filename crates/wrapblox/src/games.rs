//! Universe operations

use blox_fetch::{Invalidation, Method, RequestDescriptor, RequestOptions, descriptor::prefix_for};
use serde_json::json;
use tracing::info;

use crate::client::WrapBlox;
use crate::error::Result;

impl WrapBlox {
    pub async fn universe_favorite_count(&self, universe_id: u64) -> Result<u64> {
        self.count("Games", format!("/games/{universe_id}/favorites/count"))
            .await
    }

    /// Favorite or unfavorite a universe as the logged-in user.
    pub async fn set_favorite(&self, universe_id: u64, favorited: bool) -> Result<()> {
        self.require_login().await?;
        let d = RequestDescriptor::post(
            "Games",
            format!("/games/{universe_id}/favorites"),
            RequestOptions::new()
                .use_cache(false)
                .body(json!({ "isFavorited": favorited })),
        );
        self.fetcher().execute(&d).await?;

        // The cached count is stale now
        self.fetcher()
            .invalidate(&Invalidation::Prefix(prefix_for(
                &Method::GET,
                "Games",
                &format!("/games/{universe_id}/favorites/count"),
            )))
            .await;
        info!(universe_id, favorited, "favorite updated");
        Ok(())
    }
}
