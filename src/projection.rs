//! Caller-facing projections shared by several components.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ForumError, ForumResult};
use crate::store::ForumStore;
use crate::types::{
    AuthorSummary, CategoryId, CategorySummary, Post, PostSummary, ReactionTarget, UserId,
};

/// Author projections keyed by user id.
pub(crate) struct Authors(BTreeMap<UserId, AuthorSummary>);

impl Authors {
    pub(crate) async fn load<S: ForumStore + ?Sized>(
        store: &S,
        ids: impl IntoIterator<Item = UserId>,
    ) -> ForumResult<Self> {
        let ids: Vec<UserId> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(Self(BTreeMap::new()));
        }
        let users = store.get_users(&ids).await?;
        Ok(Self(
            users
                .iter()
                .map(|user| (user.id, AuthorSummary::from(user)))
                .collect(),
        ))
    }

    /// Projection for `id`, or a placeholder when the user row is gone.
    pub(crate) fn get(&self, id: UserId) -> AuthorSummary {
        self.0
            .get(&id)
            .cloned()
            .unwrap_or_else(|| AuthorSummary::unknown(id))
    }
}

/// Category summaries for a set of ids, active or not.
pub(crate) async fn category_summaries<S: ForumStore + ?Sized>(
    store: &S,
    ids: impl IntoIterator<Item = CategoryId>,
) -> ForumResult<BTreeMap<CategoryId, CategorySummary>> {
    let ids: Vec<CategoryId> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
    if ids.is_empty() {
        return Ok(BTreeMap::new());
    }
    let categories = store.get_categories(&ids).await?;
    Ok(categories
        .iter()
        .map(|c| (c.id, CategorySummary::from(c)))
        .collect())
}

/// Annotate posts with author, category and reaction totals, keeping order.
pub(crate) async fn summarize_posts<S: ForumStore + ?Sized>(
    store: &S,
    posts: Vec<Post>,
) -> ForumResult<Vec<PostSummary>> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let authors = Authors::load(store, posts.iter().map(|p| p.author_id)).await?;
    let categories = category_summaries(store, posts.iter().map(|p| p.category_id)).await?;
    let targets: Vec<ReactionTarget> = posts.iter().map(|p| ReactionTarget::Post(p.id)).collect();
    let reaction_counts = store.count_reactions(&targets).await?;

    posts
        .into_iter()
        .map(|post| {
            let category = categories.get(&post.category_id).cloned().ok_or_else(|| {
                ForumError::Internal(format!(
                    "post {} references missing category {}",
                    post.id, post.category_id
                ))
            })?;
            Ok(PostSummary {
                author: authors.get(post.author_id),
                category,
                reaction_count: reaction_counts
                    .get(&ReactionTarget::Post(post.id))
                    .copied()
                    .unwrap_or(0),
                post,
            })
        })
        .collect()
}

/// Validation error naming every missing field, or `Ok` when none are.
pub(crate) fn require_fields(fields: &[(&str, bool)]) -> ForumResult<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ForumError::validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// Trimmed, non-empty text.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
