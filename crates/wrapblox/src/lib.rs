//! Async client for the Roblox web APIs
//!
//! ```no_run
//! # async fn demo() -> wrapblox::Result<()> {
//! let client = wrapblox::WrapBlox::new()?;
//! let user = client.fetch_user("builderman").await?;
//! let history = client.username_history(user.id, 50).await?;
//! # let _ = history;
//! # Ok(())
//! # }
//! ```
//!
//! All calls go through one request core (`blox_fetch::Fetcher`) that
//! handles routing, caching, the anti-forgery token and rate-limit backoff.

pub mod client;
pub mod config;
pub mod error;
pub mod friends;
pub mod games;
pub mod models;
pub mod telemetry;
pub mod users;

#[cfg(test)]
mod test_support;

pub use blox_fetch::{ErrorKind, ErrorRecord};
pub use client::WrapBlox;
pub use common::Secret;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use models::{
    Badge, FriendRequest, Group, ItemType, Lookup, Ownership, SortOrder, Universe, User,
    UserSummary,
};
pub use telemetry::{LogFormat, init_tracing};
