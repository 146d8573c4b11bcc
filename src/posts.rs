//! Post lifecycle.
//!
//! `view_count` is lossy by contract: each read tries to bump it once and a
//! failed bump is logged and forgotten, never surfaced to the reader.

use std::sync::Arc;

use chrono::Utc;

use crate::category_tree::CategoryTree;
use crate::error::{ForumError, ForumResult};
use crate::pagination::PageRequest;
use crate::projection::{non_blank, require_fields, summarize_posts, Authors};
use crate::reactions::ReactionLedger;
use crate::replies::ReplyTree;
use crate::slug::{SlugGenerator, SLUG_INSERT_RETRIES};
use crate::store::{ForumStore, POST_SLUG_CONSTRAINT};
use crate::types::{
    CategoryId, CategorySummary, Post, PostDetail, PostDraft, PostPage, PostSummary,
    ReactionTarget, UserId,
};

/// Post store.
pub struct PostStore<S: ForumStore> {
    store: Arc<S>,
    categories: CategoryTree<S>,
    replies: ReplyTree<S>,
    reactions: ReactionLedger<S>,
    slugs: SlugGenerator,
}

impl<S: ForumStore + 'static> PostStore<S> {
    /// Create a post store over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            categories: CategoryTree::new(Arc::clone(&store)),
            replies: ReplyTree::new(Arc::clone(&store)),
            reactions: ReactionLedger::new(Arc::clone(&store)),
            slugs: SlugGenerator::default(),
            store,
        }
    }

    /// Replace the slug generator.
    pub fn with_slug_generator(mut self, slugs: SlugGenerator) -> Self {
        self.slugs = slugs;
        self
    }

    /// Create a post by `author`.
    ///
    /// The caller has already established that `author` is verified. The
    /// category must be active. A slug lost to a concurrent insert is
    /// regenerated up to [`SLUG_INSERT_RETRIES`] times.
    pub async fn create(&self, author: UserId, draft: PostDraft) -> ForumResult<PostSummary> {
        let title = non_blank(draft.title.as_deref());
        let content = non_blank(draft.content.as_deref());
        require_fields(&[
            ("title", title.is_some()),
            ("content", content.is_some()),
            ("categoryId", draft.category_id.is_some()),
        ])?;
        let (Some(title), Some(content), Some(category_id)) = (title, content, draft.category_id)
        else {
            return Err(ForumError::validation("Missing required fields"));
        };

        let category = self.categories.get(category_id).await?;

        for attempt in 1..=SLUG_INSERT_RETRIES {
            let store = Arc::clone(&self.store);
            let slug = self
                .slugs
                .generate(title, move |candidate| {
                    let store = Arc::clone(&store);
                    async move { store.post_slug_exists(&candidate).await }
                })
                .await?;

            let post = Post::new(
                title.to_string(),
                content.to_string(),
                slug,
                category.id,
                author,
                Utc::now(),
            );

            match self.store.insert_post(&post).await {
                Ok(()) => {
                    tracing::info!(
                        post_id = %post.id,
                        slug = %post.slug,
                        category_id = %category.id,
                        author_id = %author,
                        "post created"
                    );
                    let authors = Authors::load(self.store.as_ref(), [author]).await?;
                    return Ok(PostSummary {
                        author: authors.get(author),
                        category: CategorySummary::from(&category),
                        reaction_count: 0,
                        post,
                    });
                }
                Err(err) if err.violates(POST_SLUG_CONSTRAINT) => {
                    tracing::warn!(slug = %post.slug, attempt, "post slug taken concurrently; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ForumError::Conflict(format!(
            "Could not reserve a slug for \"{}\"",
            title
        )))
    }

    /// The post at `slug`, without counting a view.
    pub async fn find_by_slug(&self, slug: &str) -> ForumResult<Post> {
        let slug = slug.trim();
        self.store
            .get_post_by_slug(slug)
            .await?
            .ok_or_else(|| ForumError::not_found("post", slug))
    }

    /// Full view of the post at `slug`, counting one view.
    ///
    /// `viewer`, when known, marks their own reactions in the tallies.
    pub async fn get_by_slug(&self, slug: &str, viewer: Option<UserId>) -> ForumResult<PostDetail> {
        let mut post = self.find_by_slug(slug).await?;

        match self.store.increment_view_count(post.id).await {
            Ok(()) => post.view_count += 1,
            Err(err) => {
                tracing::warn!(post_id = %post.id, error = %err, "view count increment dropped");
            }
        }

        let category = self
            .store
            .get_category(post.category_id)
            .await?
            .ok_or_else(|| {
                ForumError::Internal(format!(
                    "post {} references missing category {}",
                    post.id, post.category_id
                ))
            })?;
        let breadcrumb = self.categories.breadcrumb_of(&category).await?;
        let authors = Authors::load(self.store.as_ref(), [post.author_id]).await?;
        let replies = self.replies.tree_for_post(post.id, viewer).await?;
        let reactions = self
            .reactions
            .counts_for(ReactionTarget::Post(post.id), viewer)
            .await?;

        tracing::debug!(post_id = %post.id, slug = %post.slug, "post fetched");
        Ok(PostDetail {
            author: authors.get(post.author_id),
            category: CategorySummary::from(&category),
            breadcrumb,
            replies,
            reactions,
            post,
        })
    }

    /// One page of posts, optionally within a category.
    ///
    /// Sticky posts come first, then the most recently replied to, then the
    /// newest.
    pub async fn list(
        &self,
        category_id: Option<CategoryId>,
        page: PageRequest,
    ) -> ForumResult<PostPage> {
        let page = PageRequest::new(page.page, page.limit);
        let total_count = self.store.count_posts(category_id).await?;
        let posts = self
            .store
            .list_posts(category_id, page.skip(), page.limit)
            .await?;
        let posts = summarize_posts(self.store.as_ref(), posts).await?;

        tracing::debug!(
            category_id = ?category_id,
            page = page.page,
            returned = posts.len(),
            total_count,
            "posts listed"
        );
        Ok(PostPage {
            posts,
            total_count,
            current_page: page.page,
            total_pages: page.total_pages(total_count),
        })
    }
}
