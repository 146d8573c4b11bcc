//! Nested replies under a post.
//!
//! Replies are stored flat with a nullable parent pointer. The display tree
//! is materialized per read and capped at [`MAX_REPLY_DISPLAY_DEPTH`] visual
//! levels; deeper replies are shown as siblings of their parent instead of
//! being nested further. Storage depth is unbounded.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{ForumError, ForumResult};
use crate::pagination::{resolve, PageDefaults};
use crate::projection::{non_blank, require_fields, Authors};
use crate::reactions::ReactionLedger;
use crate::store::{ForumStore, ReplyInsert};
use crate::types::{
    Post, PostId, ReactionTarget, Reply, ReplyDraft, ReplyId, ReplyListing, ReplyNode, ReplyPage,
    ReplyShape, ReplyView, UserId, MAX_REPLY_DISPLAY_DEPTH, REPLIES_PER_PAGE,
};

/// Arrange chronologically ordered replies into the display tree.
///
/// A reply whose parent is unknown, or whose ancestry loops, becomes a root.
/// Order within every level follows the input order.
pub fn build_reply_tree(views: Vec<ReplyView>) -> Vec<ReplyNode> {
    let index: HashMap<ReplyId, usize> = views
        .iter()
        .enumerate()
        .map(|(i, v)| (v.reply.id, i))
        .collect();
    let parents: Vec<Option<usize>> = views
        .iter()
        .map(|v| v.reply.parent_id.and_then(|p| index.get(&p).copied()))
        .collect();

    // Ancestor chain from the immediate parent upwards, or empty if it loops.
    let ancestry = |mut i: usize| -> Vec<usize> {
        let mut chain = Vec::new();
        while let Some(p) = parents[i] {
            if chain.len() >= parents.len() {
                return Vec::new();
            }
            chain.push(p);
            i = p;
        }
        chain
    };

    let max_level = MAX_REPLY_DISPLAY_DEPTH - 1;
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); views.len()];
    let mut roots = Vec::new();
    for i in 0..views.len() {
        let chain = ancestry(i);
        if chain.is_empty() {
            roots.push(i);
            continue;
        }
        // chain[0] is the parent; the ancestor at display level `max_level - 1`
        // adopts anything that would otherwise sit deeper than `max_level`.
        let depth = chain.len();
        let display_parent = if depth <= max_level {
            chain[0]
        } else {
            chain[depth - max_level]
        };
        children[display_parent].push(i);
    }

    let mut slots: Vec<Option<ReplyView>> = views.into_iter().map(Some).collect();
    roots
        .into_iter()
        .filter_map(|i| materialize(i, 0, &mut slots, &children))
        .collect()
}

fn materialize(
    index: usize,
    depth: usize,
    slots: &mut [Option<ReplyView>],
    children: &[Vec<usize>],
) -> Option<ReplyNode> {
    let view = slots[index].take()?;
    let nested = children[index]
        .iter()
        .filter_map(|&child| materialize(child, depth + 1, slots, children))
        .collect();
    Some(ReplyNode {
        view,
        depth,
        children: nested,
    })
}

/// Reply lifecycle for posts.
pub struct ReplyTree<S: ForumStore> {
    store: Arc<S>,
    reactions: ReactionLedger<S>,
}

impl<S: ForumStore> ReplyTree<S> {
    /// Create a reply tree over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            reactions: ReactionLedger::new(Arc::clone(&store)),
            store,
        }
    }

    async fn post(&self, post_id: PostId) -> ForumResult<Post> {
        self.store
            .get_post(post_id)
            .await?
            .ok_or_else(|| ForumError::not_found("post", post_id))
    }

    /// Create a reply by `author`.
    ///
    /// The post must exist and be unlocked; a parent reply must belong to the
    /// same post. The reply and the post's counters are written as one unit.
    pub async fn create(&self, author: UserId, draft: ReplyDraft) -> ForumResult<ReplyView> {
        let content = non_blank(draft.content.as_deref());
        require_fields(&[
            ("postId", draft.post_id.is_some()),
            ("content", content.is_some()),
        ])?;
        let (Some(post_id), Some(content)) = (draft.post_id, content) else {
            return Err(ForumError::validation("Missing required fields"));
        };

        let post = self.post(post_id).await?;
        if post.is_locked {
            return Err(ForumError::Forbidden("This post is locked".to_string()));
        }

        if let Some(parent_id) = draft.parent_id {
            let parent = self
                .store
                .get_reply(parent_id)
                .await?
                .ok_or_else(|| ForumError::not_found("reply", parent_id))?;
            if parent.post_id != post.id {
                return Err(ForumError::validation(
                    "Parent reply belongs to a different post",
                ));
            }
        }

        let reply = Reply::new(post.id, draft.parent_id, author, content.to_string(), Utc::now());
        match self.store.insert_reply(&reply).await? {
            ReplyInsert::Inserted { reply_count } => {
                tracing::info!(
                    reply_id = %reply.id,
                    post_id = %post.id,
                    parent_id = ?reply.parent_id,
                    reply_count,
                    "reply created"
                );
            }
            ReplyInsert::PostMissing => return Err(ForumError::not_found("post", post.id)),
            ReplyInsert::PostLocked => {
                return Err(ForumError::Forbidden("This post is locked".to_string()))
            }
        }

        let authors = Authors::load(self.store.as_ref(), [author]).await?;
        Ok(ReplyView {
            author: authors.get(author),
            reply,
            reactions: Default::default(),
        })
    }

    /// Attach authors and reaction tallies, keeping order.
    async fn views(&self, replies: Vec<Reply>, viewer: Option<UserId>) -> ForumResult<Vec<ReplyView>> {
        if replies.is_empty() {
            return Ok(Vec::new());
        }
        let authors = Authors::load(self.store.as_ref(), replies.iter().map(|r| r.author_id)).await?;
        let targets: Vec<ReactionTarget> = replies.iter().map(|r| ReactionTarget::Reply(r.id)).collect();
        let mut counts = self.reactions.counts_for_many(&targets, viewer).await?;

        Ok(replies
            .into_iter()
            .map(|reply| ReplyView {
                author: authors.get(reply.author_id),
                reactions: counts
                    .remove(&ReactionTarget::Reply(reply.id))
                    .unwrap_or_default(),
                reply,
            })
            .collect())
    }

    /// Display tree of every reply under `post_id`.
    pub async fn tree_for_post(
        &self,
        post_id: PostId,
        viewer: Option<UserId>,
    ) -> ForumResult<Vec<ReplyNode>> {
        let replies = self.store.list_replies(post_id).await?;
        Ok(build_reply_tree(self.views(replies, viewer).await?))
    }

    /// Every reply under a post, flat and chronological or as a display tree.
    pub async fn list_for_post(
        &self,
        post_id: PostId,
        shape: ReplyShape,
        viewer: Option<UserId>,
    ) -> ForumResult<ReplyListing> {
        let post = self.post(post_id).await?;
        let listing = match shape {
            ReplyShape::Flat => {
                let replies = self.store.list_replies(post.id).await?;
                ReplyListing::Flat(self.views(replies, viewer).await?)
            }
            ReplyShape::Tree => ReplyListing::Tree(self.tree_for_post(post.id, viewer).await?),
        };
        tracing::debug!(post_id = %post.id, replies = listing.len(), "replies listed");
        Ok(listing)
    }

    /// One page of a post's replies, [`REPLIES_PER_PAGE`] at a time.
    ///
    /// The page count derives from the post's `reply_count`. An unusable page
    /// parameter means page 1.
    pub async fn page(
        &self,
        post_id: PostId,
        page: Option<&str>,
        viewer: Option<UserId>,
    ) -> ForumResult<ReplyPage> {
        let post = self.post(post_id).await?;
        let request = resolve(
            page,
            None,
            PageDefaults {
                page: 1,
                limit: REPLIES_PER_PAGE,
            },
        );

        let replies = self
            .store
            .list_replies_page(post.id, request.skip(), request.limit)
            .await?;

        Ok(ReplyPage {
            replies: self.views(replies, viewer).await?,
            total_count: post.reply_count,
            current_page: request.page,
            total_pages: request.total_pages(post.reply_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryForumStore, StoreFault};
    use crate::types::{AuthorSummary, CategoryId, ReactionCounts};
    use chrono::{Duration, TimeZone};

    fn view(id: u128, parent: Option<u128>) -> ReplyView {
        let author = UserId::new(uuid::Uuid::from_u128(1));
        ReplyView {
            reply: Reply {
                id: ReplyId::new(uuid::Uuid::from_u128(id)),
                post_id: PostId::new(uuid::Uuid::from_u128(999)),
                parent_id: parent.map(|p| ReplyId::new(uuid::Uuid::from_u128(p))),
                author_id: author,
                content: format!("reply {}", id),
                created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap()
                    + Duration::seconds(id as i64),
            },
            author: AuthorSummary::unknown(author),
            reactions: ReactionCounts::default(),
        }
    }

    fn ids(nodes: &[ReplyNode]) -> Vec<u128> {
        nodes.iter().map(|n| n.view.reply.id.as_uuid().as_u128()).collect()
    }

    #[test]
    fn test_tree_nests_by_parent() {
        let tree = build_reply_tree(vec![view(1, None), view(2, Some(1)), view(3, None), view(4, Some(1))]);
        assert_eq!(ids(&tree), vec![1, 3]);
        assert_eq!(ids(&tree[0].children), vec![2, 4]);
        assert_eq!(tree[0].children[0].depth, 1);
    }

    #[test]
    fn test_tree_caps_display_depth() {
        // 1 <- 2 <- 3 <- 4 <- 5
        let tree = build_reply_tree(vec![
            view(1, None),
            view(2, Some(1)),
            view(3, Some(2)),
            view(4, Some(3)),
            view(5, Some(4)),
        ]);
        assert_eq!(ids(&tree), vec![1]);
        let level1 = &tree[0].children;
        assert_eq!(ids(level1), vec![2]);
        let level2 = &level1[0].children;
        assert_eq!(ids(level2), vec![3, 4, 5]);
        assert!(level2.iter().all(|n| n.depth == 2 && n.children.is_empty()));
    }

    #[test]
    fn test_orphans_and_loops_become_roots() {
        let tree = build_reply_tree(vec![view(1, Some(42)), view(2, Some(3)), view(3, Some(2))]);
        assert_eq!(ids(&tree), vec![1, 2, 3]);
    }

    async fn fixture() -> (Arc<InMemoryForumStore>, ReplyTree<InMemoryForumStore>, Post) {
        let store = Arc::new(InMemoryForumStore::new());
        let post = Post::new(
            "Thread".into(),
            "Body".into(),
            "thread".into(),
            CategoryId::generate(),
            UserId::generate(),
            Utc::now(),
        );
        store.insert_post(&post).await.unwrap();
        (Arc::clone(&store), ReplyTree::new(store), post)
    }

    #[tokio::test]
    async fn test_create_updates_counters() {
        let (store, replies, post) = fixture().await;
        let view = replies
            .create(UserId::generate(), ReplyDraft::new(post.id, "  First!  "))
            .await
            .unwrap();
        assert_eq!(view.reply.content, "First!");

        let stored = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.reply_count, 1);
        assert_eq!(stored.last_reply_at, Some(view.reply.created_at));
    }

    #[tokio::test]
    async fn test_create_rejects_locked_post() {
        let (store, replies, post) = fixture().await;
        store.set_locked(post.id, true);
        let err = replies
            .create(UserId::generate(), ReplyDraft::new(post.id, "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(store.get_post(post.id).await.unwrap().unwrap().reply_count, 0);
    }

    #[tokio::test]
    async fn test_create_validates_parent() {
        let (store, replies, post) = fixture().await;
        let other = Post::new(
            "Other".into(),
            "Body".into(),
            "other".into(),
            post.category_id,
            UserId::generate(),
            Utc::now(),
        );
        store.insert_post(&other).await.unwrap();
        let foreign = replies
            .create(UserId::generate(), ReplyDraft::new(other.id, "elsewhere"))
            .await
            .unwrap();

        let err = replies
            .create(UserId::generate(), ReplyDraft::new(post.id, "x").answering(foreign.reply.id))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = replies
            .create(UserId::generate(), ReplyDraft::new(post.id, "x").answering(ReplyId::generate()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_create_requires_fields() {
        let (_, replies, _) = fixture().await;
        let err = replies
            .create(UserId::generate(), ReplyDraft::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields: postId, content");
    }

    #[tokio::test]
    async fn test_counter_failure_leaves_no_reply() {
        let (store, replies, post) = fixture().await;
        store.arm(StoreFault::ReplyCounterUpdate);
        let err = replies
            .create(UserId::generate(), ReplyDraft::new(post.id, "lost"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(store.num_replies(), 0);
        assert_eq!(store.get_post(post.id).await.unwrap().unwrap().reply_count, 0);
    }

    #[tokio::test]
    async fn test_page_uses_fixed_page_size() {
        let (_, replies, post) = fixture().await;
        for i in 0..25 {
            replies
                .create(UserId::generate(), ReplyDraft::new(post.id, format!("reply {}", i)))
                .await
                .unwrap();
        }

        let first = replies.page(post.id, None, None).await.unwrap();
        assert_eq!(first.replies.len(), 20);
        assert_eq!(first.total_count, 25);
        assert_eq!(first.total_pages, 2);

        let second = replies.page(post.id, Some("2"), None).await.unwrap();
        assert_eq!(second.replies.len(), 5);
        assert_eq!(second.replies[0].reply.content, "reply 20");

        let garbage = replies.page(post.id, Some("zero"), None).await.unwrap();
        assert_eq!(garbage.current_page, 1);
    }

    #[tokio::test]
    async fn test_list_for_post_shapes() {
        let (_, replies, post) = fixture().await;
        let root = replies
            .create(UserId::generate(), ReplyDraft::new(post.id, "root"))
            .await
            .unwrap();
        replies
            .create(UserId::generate(), ReplyDraft::new(post.id, "child").answering(root.reply.id))
            .await
            .unwrap();

        let flat = replies.list_for_post(post.id, ReplyShape::Flat, None).await.unwrap();
        let tree = replies.list_for_post(post.id, ReplyShape::Tree, None).await.unwrap();
        assert_eq!(flat.len(), 2);
        assert_eq!(tree.len(), 2);
        match tree {
            ReplyListing::Tree(nodes) => assert_eq!(nodes.len(), 1),
            ReplyListing::Flat(_) => panic!("expected a tree"),
        }

        let err = replies
            .list_for_post(PostId::generate(), ReplyShape::Flat, None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
