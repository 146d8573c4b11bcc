//! Reply types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{PostId, ReplyId, UserId};
use super::reaction::ReactionCounts;
use super::user::AuthorSummary;

/// Number of visual nesting levels rendered for a reply thread.
pub const MAX_REPLY_DISPLAY_DEPTH: usize = 3;

/// Replies shown per page of a post.
pub const REPLIES_PER_PAGE: u32 = 20;

/// A reply row. `parent_id`, when set, references a reply under the same post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    /// Reply id.
    pub id: ReplyId,
    /// Post the reply belongs to.
    pub post_id: PostId,
    /// Reply being answered, `None` at top level.
    pub parent_id: Option<ReplyId>,
    /// Author.
    pub author_id: UserId,
    /// Trimmed body.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Reply {
    /// New reply row with a fresh id.
    pub fn new(
        post_id: PostId,
        parent_id: Option<ReplyId>,
        author_id: UserId,
        content: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReplyId::generate(),
            post_id,
            parent_id,
            author_id,
            content,
            created_at,
        }
    }
}

/// Raw input for creating a reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyDraft {
    /// Required.
    pub post_id: Option<PostId>,
    /// Required, trimmed.
    pub content: Option<String>,
    /// Reply being answered, on the same post.
    pub parent_id: Option<ReplyId>,
}

impl ReplyDraft {
    /// A top-level reply draft.
    pub fn new(post_id: PostId, content: impl Into<String>) -> Self {
        Self {
            post_id: Some(post_id),
            content: Some(content.into()),
            parent_id: None,
        }
    }

    /// Answer another reply instead of the post itself.
    pub fn answering(mut self, parent_id: ReplyId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// A reply with its author and reaction tallies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyView {
    /// The reply row.
    #[serde(flatten)]
    pub reply: Reply,
    /// Author projection.
    pub author: AuthorSummary,
    /// Reaction tallies.
    pub reactions: ReactionCounts,
}

/// A reply placed in the display tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyNode {
    /// The reply with its projections.
    #[serde(flatten)]
    pub view: ReplyView,
    /// Visual level, 0-based, always below `MAX_REPLY_DISPLAY_DEPTH`.
    pub depth: usize,
    /// Direct answers, oldest first.
    pub children: Vec<ReplyNode>,
}

/// Requested shape of a reply listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyShape {
    /// Chronological list.
    Flat,
    /// Parent to children tree, display-capped.
    #[default]
    Tree,
}

/// A reply listing in the requested shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", content = "replies", rename_all = "lowercase")]
pub enum ReplyListing {
    /// Chronological replies.
    Flat(Vec<ReplyView>),
    /// Root replies with their children.
    Tree(Vec<ReplyNode>),
}

impl ReplyListing {
    /// Number of replies in the listing, nested ones included.
    pub fn len(&self) -> usize {
        fn count(nodes: &[ReplyNode]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        match self {
            Self::Flat(list) => list.len(),
            Self::Tree(nodes) => count(nodes),
        }
    }

    /// No replies at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One page of a post's replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPage {
    /// Replies on this page, oldest first.
    pub replies: Vec<ReplyView>,
    /// The post's reply count.
    pub total_count: u64,
    /// Page that was served.
    pub current_page: u32,
    /// Page count, at least one.
    pub total_pages: u32,
}
