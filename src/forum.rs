//! All forum components wired to one store.

use std::sync::Arc;

use crate::category_tree::CategoryTree;
use crate::error::ForumResult;
use crate::identity::Identity;
use crate::posts::PostStore;
use crate::reactions::ReactionLedger;
use crate::replies::ReplyTree;
use crate::search::SearchIndex;
use crate::store::ForumStore;

/// The forum components over a shared store.
pub struct Forum<S: ForumStore> {
    store: Arc<S>,
    /// Category taxonomy.
    pub categories: CategoryTree<S>,
    /// Thread starters.
    pub posts: PostStore<S>,
    /// Nested replies.
    pub replies: ReplyTree<S>,
    /// Reaction toggles and tallies.
    pub reactions: ReactionLedger<S>,
    /// Text search over posts and categories.
    pub search: SearchIndex<S>,
}

impl<S: ForumStore + 'static> Forum<S> {
    /// Wire every component to `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            categories: CategoryTree::new(Arc::clone(&store)),
            posts: PostStore::new(Arc::clone(&store)),
            replies: ReplyTree::new(Arc::clone(&store)),
            reactions: ReactionLedger::new(Arc::clone(&store)),
            search: SearchIndex::new(Arc::clone(&store)),
            store,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record the caller's display name so author projections resolve.
    ///
    /// Callers without a forwarded name are left as they are in the store.
    pub async fn sync_author(&self, identity: &Identity) -> ForumResult<()> {
        if let Some(user) = identity.profile() {
            self.store.upsert_user(&user).await?;
            tracing::debug!(user_id = %user.id, "author profile synced");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryForumStore;
    use crate::types::{NewCategory, PostDraft, User, UserId, UNKNOWN_AUTHOR_NAME};

    #[tokio::test]
    async fn test_synced_author_is_projected_on_new_posts() {
        let forum = Forum::new(Arc::new(InMemoryForumStore::new()));
        let category = forum
            .categories
            .create(NewCategory::named("General", 1))
            .await
            .unwrap();
        let caller = Identity::verified(UserId::generate()).with_display_name("Ada");

        forum.sync_author(&caller).await.unwrap();
        let created = forum
            .posts
            .create(caller.user_id, PostDraft::new("Hello", "b", category.id))
            .await
            .unwrap();
        assert_eq!(created.author.name, "Ada");
    }

    #[tokio::test]
    async fn test_sync_without_name_keeps_existing_row() {
        let store = Arc::new(InMemoryForumStore::new());
        let forum = Forum::new(Arc::clone(&store));
        let id = UserId::generate();
        store.add_user(User::new(id, "Known"));

        forum.sync_author(&Identity::verified(id)).await.unwrap();
        let category = forum
            .categories
            .create(NewCategory::named("General", 1))
            .await
            .unwrap();
        let created = forum
            .posts
            .create(id, PostDraft::new("Hello", "b", category.id))
            .await
            .unwrap();
        assert_eq!(created.author.name, "Known");

        let stranger = forum
            .posts
            .create(UserId::generate(), PostDraft::new("Hello", "b", category.id))
            .await
            .unwrap();
        assert_eq!(stranger.author.name, UNKNOWN_AUTHOR_NAME);
    }
}
