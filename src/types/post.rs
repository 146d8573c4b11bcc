//! Post types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::CategorySummary;
use super::ids::{CategoryId, PostId, UserId};
use super::reaction::ReactionCounts;
use super::reply::ReplyNode;
use super::user::AuthorSummary;

/// A post row.
///
/// `view_count` is a lossy counter: increments are best-effort and may be
/// dropped under failure. `reply_count` and `last_reply_at` are written in the
/// same transaction as the reply that changes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Post id.
    pub id: PostId,
    /// Trimmed title.
    pub title: String,
    /// Trimmed body.
    pub content: String,
    /// Globally unique.
    pub slug: String,
    /// Category the post is filed under.
    pub category_id: CategoryId,
    /// Author.
    pub author_id: UserId,
    /// Best-effort view counter.
    pub view_count: u64,
    /// Replies at any depth.
    pub reply_count: u64,
    /// Sticky posts list first.
    pub is_sticky: bool,
    /// Locked posts take no new replies.
    pub is_locked: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the newest reply.
    pub last_reply_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Create a fresh post with zeroed counters.
    pub fn new(
        title: String,
        content: String,
        slug: String,
        category_id: CategoryId,
        author_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PostId::generate(),
            title,
            content,
            slug,
            category_id,
            author_id,
            view_count: 0,
            reply_count: 0,
            is_sticky: false,
            is_locked: false,
            created_at,
            last_reply_at: None,
        }
    }
}

/// Raw input for creating a post, as received from a caller.
///
/// Fields are optional so that missing input surfaces as a validation error
/// instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    /// Required, trimmed.
    pub title: Option<String>,
    /// Required, trimmed.
    pub content: Option<String>,
    /// Required; must be an active category.
    pub category_id: Option<CategoryId>,
}

impl PostDraft {
    /// A complete draft.
    pub fn new(title: impl Into<String>, content: impl Into<String>, category_id: CategoryId) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
            category_id: Some(category_id),
        }
    }
}

/// Post annotated for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    /// The post row.
    #[serde(flatten)]
    pub post: Post,
    /// Author projection.
    pub author: AuthorSummary,
    /// Category projection.
    pub category: CategorySummary,
    /// Reactions of every kind on the post.
    pub reaction_count: u64,
}

/// Full post view: the post with its replies and reactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    /// The post row.
    #[serde(flatten)]
    pub post: Post,
    /// Author projection.
    pub author: AuthorSummary,
    /// Category projection.
    pub category: CategorySummary,
    /// Root-to-leaf path ending at the post's category.
    pub breadcrumb: Vec<CategorySummary>,
    /// Reply tree, display-capped.
    pub replies: Vec<ReplyNode>,
    /// Reactions on the post itself.
    pub reactions: ReactionCounts,
}

/// One page of a post listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    /// Posts on this page.
    pub posts: Vec<PostSummary>,
    /// Posts matching the filter.
    pub total_count: u64,
    /// Page that was served.
    pub current_page: u32,
    /// Page count, at least one.
    pub total_pages: u32,
}
