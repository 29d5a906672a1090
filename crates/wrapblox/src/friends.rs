//! Friend requests
//!
//! Requests are listed and answered as an explicit identity (`target`), sent
//! as a per-request credential override. The client's own session and its
//! anti-forgery token are never touched by these calls.

use blox_fetch::{RequestDescriptor, RequestOptions};
use common::Secret;
use serde::Deserialize;
use tracing::info;

use crate::client::WrapBlox;
use crate::error::Result;
use crate::models::FriendRequest;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFriendRequest {
    friend_request: RawRequestInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRequestInfo {
    sender_id: u64,
    sent_at: String,
}

impl WrapBlox {
    /// Pending friend requests addressed to `target`.
    pub async fn friend_requests(
        &self,
        target: impl Into<Secret<String>>,
        max_results: usize,
    ) -> Result<Vec<FriendRequest>> {
        let target = target.into();
        let d = RequestDescriptor::get(
            "Friends",
            "/my/friends/requests",
            RequestOptions::new().use_cache(false).cookie(target.clone()),
        );
        let raw: Vec<RawFriendRequest> = self.fetcher().fetch_envelope_list(&d, max_results).await?;
        Ok(raw
            .into_iter()
            .map(|r| FriendRequest {
                sender_id: r.friend_request.sender_id,
                sent_at: r.friend_request.sent_at,
                target: target.clone(),
            })
            .collect())
    }

    pub async fn accept_friend_request(&self, request: &FriendRequest) -> Result<()> {
        self.answer_friend_request(request, "accept-friend-request").await
    }

    pub async fn decline_friend_request(&self, request: &FriendRequest) -> Result<()> {
        self.answer_friend_request(request, "decline-friend-request").await
    }

    async fn answer_friend_request(&self, request: &FriendRequest, action: &str) -> Result<()> {
        let d = RequestDescriptor::post(
            "Friends",
            format!("/users/{}/{action}", request.sender_id),
            RequestOptions::new()
                .use_cache(false)
                .cookie(request.target.clone()),
        );
        self.fetcher().execute(&d).await?;
        info!(sender_id = request.sender_id, action, "friend request answered");
        Ok(())
    }
}
