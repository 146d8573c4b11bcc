//! Forum storage backends.
//!
//! The store is the single owner of durable state. Components hold no
//! entities between calls; each operation reads the rows it needs and writes
//! through one of the methods below. Methods documented as atomic must apply
//! all of their effects or none of them.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::types::{
    Category, CategoryId, Post, PostId, Reaction, ReactionId, ReactionKey, ReactionTarget, Reply,
    ReplyId, User, UserId,
};

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected a write.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation {
        /// Name of the violated constraint.
        constraint: String,
    },
    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this is any uniqueness violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    /// Whether this is a violation of the named uniqueness constraint.
    pub fn violates(&self, name: &str) -> bool {
        matches!(self, Self::UniqueViolation { constraint } if constraint == name)
    }
}

/// Constraint guarding post slug uniqueness.
pub const POST_SLUG_CONSTRAINT: &str = "forum_posts_slug_key";
/// Constraint guarding category slug uniqueness within a parent.
pub const CATEGORY_SLUG_CONSTRAINT: &str = "forum_categories_parent_slug_key";
/// Constraint guarding one reaction per (target, user, type).
pub const REACTION_CONSTRAINT: &str = "forum_reactions_target_user_type_key";

/// Filters for a post text search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostSearch {
    /// Case-insensitive substring matched against title or content.
    pub text: String,
    /// Only posts in this category.
    pub category_id: Option<CategoryId>,
    /// Case-insensitive match on the post's category city.
    pub city: Option<String>,
}

/// Filters for a category text search. Only active categories match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySearch {
    /// Case-insensitive substring matched against name or description.
    pub text: String,
    /// Case-insensitive match on the category city.
    pub city: Option<String>,
}

/// Outcome of the atomic reply insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyInsert {
    /// Reply stored; the post's counters were updated in the same unit.
    Inserted {
        /// The post's reply count after the insert.
        reply_count: u64,
    },
    /// The post disappeared before the write.
    PostMissing,
    /// The post was locked before the write.
    PostLocked,
}

/// Trait for forum storage backends.
///
/// Listings are returned in their documented order so every backend yields
/// identical pages for identical data.
#[async_trait]
pub trait ForumStore: Send + Sync {
    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    // ── Users ───────────────────────────────────────────────────────────

    /// Fetch user projections for a set of ids; unknown ids are skipped.
    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError>;

    /// Insert or refresh a user's display data.
    async fn upsert_user(&self, user: &User) -> Result<(), StoreError>;

    // ── Categories ──────────────────────────────────────────────────────

    /// Fetch a category by id, active or not.
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;

    /// Fetch categories by id, active or not.
    async fn get_categories(&self, ids: &[CategoryId]) -> Result<Vec<Category>, StoreError>;

    /// Active root categories ordered by `display_order`.
    async fn list_root_categories(&self) -> Result<Vec<Category>, StoreError>;

    /// Active children of any of `parent_ids`, ordered by `display_order`.
    async fn list_child_categories(
        &self,
        parent_ids: &[CategoryId],
    ) -> Result<Vec<Category>, StoreError>;

    /// Whether `slug` is taken among the children of `parent_id`.
    async fn category_slug_exists(
        &self,
        parent_id: Option<CategoryId>,
        slug: &str,
    ) -> Result<bool, StoreError>;

    /// Insert a category. Fails with `UniqueViolation` on a duplicate scoped slug.
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError>;

    /// Number of posts filed directly under each of `ids`; zero counts may be omitted.
    async fn count_posts_by_category(
        &self,
        ids: &[CategoryId],
    ) -> Result<BTreeMap<CategoryId, u64>, StoreError>;

    /// Active categories matching a search, ordered by `display_order`.
    async fn search_categories(
        &self,
        search: &CategorySearch,
        limit: u32,
    ) -> Result<Vec<Category>, StoreError>;

    // ── Posts ───────────────────────────────────────────────────────────

    /// Fetch a post by id.
    async fn get_post(&self, id: PostId) -> Result<Option<Post>, StoreError>;

    /// Fetch a post by slug.
    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError>;

    /// Whether a post already uses `slug`.
    async fn post_slug_exists(&self, slug: &str) -> Result<bool, StoreError>;

    /// Insert a post. Fails with `UniqueViolation` on a duplicate slug.
    async fn insert_post(&self, post: &Post) -> Result<(), StoreError>;

    /// Add one to the view counter. Best-effort; callers may ignore failure.
    async fn increment_view_count(&self, id: PostId) -> Result<(), StoreError>;

    /// Posts ordered sticky first, then `last_reply_at` descending (nulls
    /// last), then `created_at` descending.
    async fn list_posts(
        &self,
        category_id: Option<CategoryId>,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<Post>, StoreError>;

    /// Number of posts, optionally within one category.
    async fn count_posts(&self, category_id: Option<CategoryId>) -> Result<u64, StoreError>;

    /// Posts matching a search, ordered by `created_at` descending.
    async fn search_posts(
        &self,
        search: &PostSearch,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<Post>, StoreError>;

    /// Number of posts matching a search.
    async fn count_search_posts(&self, search: &PostSearch) -> Result<u64, StoreError>;

    // ── Replies ─────────────────────────────────────────────────────────

    /// Fetch a reply by id.
    async fn get_reply(&self, id: ReplyId) -> Result<Option<Reply>, StoreError>;

    /// Atomically insert `reply`, add one to its post's `reply_count`, and
    /// set the post's `last_reply_at` to the reply's creation time.
    ///
    /// The post's existence and lock flag are re-checked inside the unit.
    async fn insert_reply(&self, reply: &Reply) -> Result<ReplyInsert, StoreError>;

    /// All replies of a post ordered by `created_at` ascending.
    async fn list_replies(&self, post_id: PostId) -> Result<Vec<Reply>, StoreError>;

    /// A window of a post's replies ordered by `created_at` ascending.
    async fn list_replies_page(
        &self,
        post_id: PostId,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<Reply>, StoreError>;

    // ── Reactions ───────────────────────────────────────────────────────

    /// The reaction stored under `key`, if any.
    async fn find_reaction(&self, key: &ReactionKey) -> Result<Option<Reaction>, StoreError>;

    /// Insert a reaction. Fails with `UniqueViolation` when the key exists.
    async fn insert_reaction(&self, reaction: &Reaction) -> Result<(), StoreError>;

    /// Delete a reaction by id. Returns false when it was already gone.
    async fn delete_reaction(&self, id: ReactionId) -> Result<bool, StoreError>;

    /// All reactions attached to any of `targets`.
    async fn list_reactions(&self, targets: &[ReactionTarget]) -> Result<Vec<Reaction>, StoreError>;

    /// Reaction totals per target; targets without reactions may be omitted.
    async fn count_reactions(
        &self,
        targets: &[ReactionTarget],
    ) -> Result<BTreeMap<ReactionTarget, u64>, StoreError>;
}

pub use memory::{InMemoryForumStore, StoreFault};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresForumStore};
