//! Core types for the forum.

pub mod ids;
pub mod user;
pub mod category;
pub mod post;
pub mod reply;
pub mod reaction;

pub use ids::{CategoryId, PostId, ReactionId, ReplyId, UserId};
pub use user::{AuthorSummary, User, UNKNOWN_AUTHOR_NAME};
pub use category::{
    Category, CategoryMatch, CategoryNode, CategorySummary, NewCategory, MAX_CATEGORY_DEPTH,
};
pub use post::{Post, PostDetail, PostDraft, PostPage, PostSummary};
pub use reply::{
    Reply, ReplyDraft, ReplyListing, ReplyNode, ReplyPage, ReplyShape, ReplyView,
    MAX_REPLY_DISPLAY_DEPTH, REPLIES_PER_PAGE,
};
pub use reaction::{
    Reaction, ReactionCounts, ReactionKey, ReactionTarget, ReactionTargetType, ReactionType,
    ToggleOutcome,
};
