//! # property-forum
//!
//! Community discussion engine for a real-estate marketplace.
//!
//! The forum stores a shallow category taxonomy, posts with nested replies,
//! toggled reactions, and answers text searches across posts and categories.
//!
//! ## Architecture
//!
//! ```text
//! caller → Forum { CategoryTree, PostStore, ReplyTree, ReactionLedger, SearchIndex }
//!                                   ↓
//!                     ForumStore (Postgres or Memory)
//! ```
//!
//! Components hold no entities between calls. Every write that must be
//! atomic is a single [`ForumStore`] method; races the store cannot rule
//! out (slug collisions, duplicate reactions) surface as uniqueness
//! violations and are resolved by the component that issued the write.
//!
//! ## Quick start
//!
//! ```no_run
//! # async fn demo() -> Result<(), property_forum::ForumError> {
//! use std::sync::Arc;
//! use property_forum::{Forum, InMemoryForumStore, NewCategory, PostDraft, UserId};
//!
//! let forum = Forum::new(Arc::new(InMemoryForumStore::new()));
//! let general = forum.categories.create(NewCategory::named("General", 1)).await?;
//! let post = forum
//!     .posts
//!     .create(UserId::generate(), PostDraft::new("Hello World", "First post", general.id))
//!     .await?;
//! assert_eq!(post.post.slug, "hello-world");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod category_tree;
pub mod error;
pub mod forum;
pub mod identity;
pub mod pagination;
pub mod posts;
mod projection;
pub mod reactions;
pub mod replies;
pub mod search;
pub mod slug;
pub mod store;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use category_tree::CategoryTree;
pub use error::{ForumError, ForumResult};
pub use forum::Forum;
pub use identity::{require_authenticated, require_verified, Identity};
pub use pagination::{PageDefaults, PageRequest};
pub use posts::PostStore;
pub use reactions::{parse_toggle_request, ReactionLedger};
pub use replies::{build_reply_tree, ReplyTree};
pub use search::{SearchIndex, SearchKind, SearchParams, SearchResults};
pub use slug::{slugify, SlugGenerator};
pub use store::{ForumStore, InMemoryForumStore, StoreError, StoreFault};
#[cfg(feature = "postgres")]
pub use store::{PostgresConfig, PostgresForumStore};
pub use types::*;

#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};
