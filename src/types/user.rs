//! User projections.
//!
//! Accounts live in the marketplace's identity service; the forum only keeps
//! the display data it needs to attribute posts and replies.

use serde::{Deserialize, Serialize};

use super::ids::UserId;

/// Display name used when an author row is missing from the store.
pub const UNKNOWN_AUTHOR_NAME: &str = "Former member";

/// A user as known to the forum store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Marketplace user id.
    pub id: UserId,
    /// Public display name.
    pub name: String,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
}

impl User {
    /// Create a user without an avatar.
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            avatar_url: None,
        }
    }
}

/// Author projection attached to posts and replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Avatar URL, if any.
    pub avatar_url: Option<String>,
}

impl AuthorSummary {
    /// Placeholder for an author that no longer resolves.
    pub fn unknown(id: UserId) -> Self {
        Self {
            id,
            name: UNKNOWN_AUTHOR_NAME.to_string(),
            avatar_url: None,
        }
    }
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}
