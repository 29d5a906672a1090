//! Typed records for the entities the facade returns
//!
//! Only the commonly used fields are shaped; unknown fields are ignored.

use std::fmt;

use blox_fetch::ErrorRecord;
use common::Secret;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub has_verified_badge: bool,
    #[serde(default)]
    pub is_banned: bool,
    /// ISO-8601 join timestamp
    #[serde(default)]
    pub created: Option<String>,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.id)
    }
}

/// Short user record returned by follower/following lists.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub has_verified_badge: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Universe {
    pub id: u64,
    #[serde(default)]
    pub root_place_id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub playing: u64,
    #[serde(default)]
    pub visits: u64,
    #[serde(default)]
    pub max_players: u64,
}

/// A pending friend request addressed to `target`.
///
/// Accepting or declining acts as `target`, which need not be the client's
/// logged-in identity.
#[derive(Debug, Clone)]
pub struct FriendRequest {
    pub sender_id: u64,
    pub sent_at: String,
    pub target: Secret<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "Asc",
            SortOrder::Desc => "Desc",
        }
    }
}

/// Inventory item types accepted by the ownership endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Asset,
    GamePass,
    Badge,
    Bundle,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Asset => "Asset",
            ItemType::GamePass => "GamePass",
            ItemType::Badge => "Badge",
            ItemType::Bundle => "Bundle",
        }
    }
}

/// Result of an ownership check. A failed check is `Unknown`, never
/// `NotOwned`.
#[derive(Debug, Clone, PartialEq)]
pub enum Ownership {
    Owned,
    NotOwned,
    Unknown(ErrorRecord),
}

impl Ownership {
    pub fn is_owned(&self) -> bool {
        matches!(self, Ownership::Owned)
    }
}

/// How to look up a user or group: by id, or by exact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(u64),
    Name(String),
}

impl From<u64> for Lookup {
    fn from(id: u64) -> Self {
        Lookup::Id(id)
    }
}

impl From<&str> for Lookup {
    fn from(name: &str) -> Self {
        Lookup::Name(name.to_string())
    }
}

impl From<String> for Lookup {
    fn from(name: String) -> Self {
        Lookup::Name(name)
    }
}
