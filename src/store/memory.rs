//! In-memory forum store for testing and local development.
//!
//! Every mutating method runs under a single write lock, which gives the same
//! all-or-nothing behavior the Postgres backend gets from transactions.
//! One-shot [`StoreFault`]s let tests provoke the failure and race paths the
//! components must survive.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::types::{
    Category, CategoryId, Post, PostId, Reaction, ReactionId, ReactionKey, ReactionTarget, Reply,
    ReplyId, User, UserId,
};
use super::{
    CategorySearch, ForumStore, PostSearch, ReplyInsert, StoreError, CATEGORY_SLUG_CONSTRAINT,
    POST_SLUG_CONSTRAINT, REACTION_CONSTRAINT,
};

/// Failures that can be armed on an [`InMemoryForumStore`].
///
/// Each fault fires once, on the next call to the affected method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreFault {
    /// `ping` reports the backend unreachable.
    Unavailable,
    /// `increment_view_count` fails.
    ViewIncrement,
    /// `insert_reply` fails after storing the reply but before updating the
    /// post's counters; the unit must roll back.
    ReplyCounterUpdate,
    /// `insert_post` loses a race: another writer takes the same slug first.
    RacingPostSlug,
    /// `insert_reaction` loses a race: another request inserts the same key first.
    RacingReactionInsert,
}

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<UserId, User>,
    /// Rows are kept in insertion order; it breaks ordering ties.
    categories: Vec<Category>,
    posts: Vec<Post>,
    replies: Vec<Reply>,
    reactions: Vec<Reaction>,
}

/// In-memory forum store.
#[derive(Debug, Default)]
pub struct InMemoryForumStore {
    inner: RwLock<Inner>,
    faults: Mutex<BTreeSet<StoreFault>>,
}

impl InMemoryForumStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot fault.
    pub fn arm(&self, fault: StoreFault) {
        self.faults.lock().insert(fault);
    }

    /// Consume a fault if armed.
    fn fires(&self, fault: StoreFault) -> bool {
        self.faults.lock().remove(&fault)
    }

    /// Add or replace a user.
    pub fn add_user(&self, user: User) {
        self.inner.write().users.insert(user.id, user);
    }

    /// Set a post's lock flag. Returns false if the post is unknown.
    pub fn set_locked(&self, id: PostId, locked: bool) -> bool {
        self.update_post(id, |post| post.is_locked = locked)
    }

    /// Set a post's sticky flag. Returns false if the post is unknown.
    pub fn set_sticky(&self, id: PostId, sticky: bool) -> bool {
        self.update_post(id, |post| post.is_sticky = sticky)
    }

    fn update_post(&self, id: PostId, f: impl FnOnce(&mut Post)) -> bool {
        let mut inner = self.inner.write();
        match inner.posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                f(post);
                true
            }
            None => false,
        }
    }

    /// Get number of posts.
    pub fn num_posts(&self) -> usize {
        self.inner.read().posts.len()
    }

    /// Get number of replies.
    pub fn num_replies(&self) -> usize {
        self.inner.read().replies.len()
    }

    /// Get number of reactions.
    pub fn num_reactions(&self) -> usize {
        self.inner.read().reactions.len()
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn same_city(city: Option<&str>, wanted: &str) -> bool {
    city.map(|c| c.to_lowercase() == wanted.to_lowercase())
        .unwrap_or(false)
}

fn by_display_order(a: &(usize, &Category), b: &(usize, &Category)) -> Ordering {
    a.1.display_order
        .cmp(&b.1.display_order)
        .then_with(|| a.0.cmp(&b.0))
}

/// Sticky first, then most recent reply (posts without replies last), then newest.
fn by_listing_order(a: &(usize, &Post), b: &(usize, &Post)) -> Ordering {
    b.1.is_sticky
        .cmp(&a.1.is_sticky)
        .then_with(|| match (a.1.last_reply_at, b.1.last_reply_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| b.1.created_at.cmp(&a.1.created_at))
        .then_with(|| b.0.cmp(&a.0))
}

fn by_newest(a: &(usize, &Post), b: &(usize, &Post)) -> Ordering {
    b.1.created_at
        .cmp(&a.1.created_at)
        .then_with(|| b.0.cmp(&a.0))
}

fn window<T: Clone>(rows: Vec<(usize, &T)>, skip: u64, limit: u32) -> Vec<T> {
    rows.into_iter()
        .skip(usize::try_from(skip).unwrap_or(usize::MAX))
        .take(limit as usize)
        .map(|(_, row)| row.clone())
        .collect()
}

impl Inner {
    fn matching_posts(&self, search: &PostSearch) -> Vec<(usize, &Post)> {
        let needle = search.text.to_lowercase();
        self.posts
            .iter()
            .enumerate()
            .filter(|(_, p)| contains_ci(&p.title, &needle) || contains_ci(&p.content, &needle))
            .filter(|(_, p)| search.category_id.map_or(true, |id| p.category_id == id))
            .filter(|(_, p)| match &search.city {
                Some(city) => self
                    .categories
                    .iter()
                    .find(|c| c.id == p.category_id)
                    .map_or(false, |c| same_city(c.city.as_deref(), city)),
                None => true,
            })
            .collect()
    }

    fn sorted_replies(&self, post_id: PostId) -> Vec<(usize, &Reply)> {
        let mut rows: Vec<_> = self
            .replies
            .iter()
            .enumerate()
            .filter(|(_, r)| r.post_id == post_id)
            .collect();
        rows.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at).then_with(|| a.0.cmp(&b.0)));
        rows
    }
}

#[async_trait]
impl ForumStore for InMemoryForumStore {
    async fn ping(&self) -> Result<(), StoreError> {
        if self.fires(StoreFault::Unavailable) {
            return Err(StoreError::Backend("store unavailable".to_string()));
        }
        Ok(())
    }

    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.read();
        Ok(ids.iter().filter_map(|id| inner.users.get(id).cloned()).collect())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let avatar_url = user.avatar_url.clone().or_else(|| {
            inner.users.get(&user.id).and_then(|existing| existing.avatar_url.clone())
        });
        inner.users.insert(
            user.id,
            User {
                avatar_url,
                ..user.clone()
            },
        );
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        Ok(self.inner.read().categories.iter().find(|c| c.id == id).cloned())
    }

    async fn get_categories(&self, ids: &[CategoryId]) -> Result<Vec<Category>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .categories
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn list_root_categories(&self) -> Result<Vec<Category>, StoreError> {
        let inner = self.inner.read();
        let mut rows: Vec<_> = inner
            .categories
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_active && c.parent_id.is_none())
            .collect();
        rows.sort_by(by_display_order);
        Ok(rows.into_iter().map(|(_, c)| c.clone()).collect())
    }

    async fn list_child_categories(
        &self,
        parent_ids: &[CategoryId],
    ) -> Result<Vec<Category>, StoreError> {
        let inner = self.inner.read();
        let mut rows: Vec<_> = inner
            .categories
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_active && c.parent_id.map_or(false, |p| parent_ids.contains(&p)))
            .collect();
        rows.sort_by(by_display_order);
        Ok(rows.into_iter().map(|(_, c)| c.clone()).collect())
    }

    async fn category_slug_exists(
        &self,
        parent_id: Option<CategoryId>,
        slug: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .categories
            .iter()
            .any(|c| c.parent_id == parent_id && c.slug == slug))
    }

    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner
            .categories
            .iter()
            .any(|c| c.parent_id == category.parent_id && c.slug == category.slug)
        {
            return Err(StoreError::UniqueViolation {
                constraint: CATEGORY_SLUG_CONSTRAINT.to_string(),
            });
        }
        if let Some(parent_id) = category.parent_id {
            if !inner.categories.iter().any(|c| c.id == parent_id) {
                return Err(StoreError::Backend(format!(
                    "foreign key violation: parent category {} does not exist",
                    parent_id
                )));
            }
        }
        inner.categories.push(category.clone());
        Ok(())
    }

    async fn count_posts_by_category(
        &self,
        ids: &[CategoryId],
    ) -> Result<BTreeMap<CategoryId, u64>, StoreError> {
        let inner = self.inner.read();
        let mut counts = BTreeMap::new();
        for post in inner.posts.iter().filter(|p| ids.contains(&p.category_id)) {
            *counts.entry(post.category_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn search_categories(
        &self,
        search: &CategorySearch,
        limit: u32,
    ) -> Result<Vec<Category>, StoreError> {
        let inner = self.inner.read();
        let needle = search.text.to_lowercase();
        let mut rows: Vec<_> = inner
            .categories
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_active)
            .filter(|(_, c)| {
                contains_ci(&c.name, &needle)
                    || c.description.as_deref().map_or(false, |d| contains_ci(d, &needle))
            })
            .filter(|(_, c)| match &search.city {
                Some(city) => same_city(c.city.as_deref(), city),
                None => true,
            })
            .collect();
        rows.sort_by(by_display_order);
        Ok(window(rows, 0, limit))
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.inner.read().posts.iter().find(|p| p.id == id).cloned())
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError> {
        Ok(self.inner.read().posts.iter().find(|p| p.slug == slug).cloned())
    }

    async fn post_slug_exists(&self, slug: &str) -> Result<bool, StoreError> {
        Ok(self.inner.read().posts.iter().any(|p| p.slug == slug))
    }

    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        let racing = self.fires(StoreFault::RacingPostSlug);
        let mut inner = self.inner.write();
        if racing {
            let mut rival = post.clone();
            rival.id = PostId::generate();
            inner.posts.push(rival);
        }
        if inner.posts.iter().any(|p| p.slug == post.slug) {
            return Err(StoreError::UniqueViolation {
                constraint: POST_SLUG_CONSTRAINT.to_string(),
            });
        }
        inner.posts.push(post.clone());
        Ok(())
    }

    async fn increment_view_count(&self, id: PostId) -> Result<(), StoreError> {
        if self.fires(StoreFault::ViewIncrement) {
            return Err(StoreError::Backend("view counter update failed".to_string()));
        }
        self.update_post(id, |post| post.view_count += 1);
        Ok(())
    }

    async fn list_posts(
        &self,
        category_id: Option<CategoryId>,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<Post>, StoreError> {
        let inner = self.inner.read();
        let mut rows: Vec<_> = inner
            .posts
            .iter()
            .enumerate()
            .filter(|(_, p)| category_id.map_or(true, |id| p.category_id == id))
            .collect();
        rows.sort_by(by_listing_order);
        Ok(window(rows, skip, limit))
    }

    async fn count_posts(&self, category_id: Option<CategoryId>) -> Result<u64, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .posts
            .iter()
            .filter(|p| category_id.map_or(true, |id| p.category_id == id))
            .count() as u64)
    }

    async fn search_posts(
        &self,
        search: &PostSearch,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<Post>, StoreError> {
        let inner = self.inner.read();
        let mut rows = inner.matching_posts(search);
        rows.sort_by(by_newest);
        Ok(window(rows, skip, limit))
    }

    async fn count_search_posts(&self, search: &PostSearch) -> Result<u64, StoreError> {
        Ok(self.inner.read().matching_posts(search).len() as u64)
    }

    async fn get_reply(&self, id: ReplyId) -> Result<Option<Reply>, StoreError> {
        Ok(self.inner.read().replies.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_reply(&self, reply: &Reply) -> Result<ReplyInsert, StoreError> {
        let fail_counter = self.fires(StoreFault::ReplyCounterUpdate);
        let mut inner = self.inner.write();

        let Some(index) = inner.posts.iter().position(|p| p.id == reply.post_id) else {
            return Ok(ReplyInsert::PostMissing);
        };
        if inner.posts[index].is_locked {
            return Ok(ReplyInsert::PostLocked);
        }

        inner.replies.push(reply.clone());
        if fail_counter {
            inner.replies.pop();
            return Err(StoreError::Backend("reply counter update failed".to_string()));
        }

        let post = &mut inner.posts[index];
        post.reply_count += 1;
        post.last_reply_at = Some(reply.created_at);
        Ok(ReplyInsert::Inserted {
            reply_count: post.reply_count,
        })
    }

    async fn list_replies(&self, post_id: PostId) -> Result<Vec<Reply>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .sorted_replies(post_id)
            .into_iter()
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn list_replies_page(
        &self,
        post_id: PostId,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<Reply>, StoreError> {
        let inner = self.inner.read();
        Ok(window(inner.sorted_replies(post_id), skip, limit))
    }

    async fn find_reaction(&self, key: &ReactionKey) -> Result<Option<Reaction>, StoreError> {
        Ok(self
            .inner
            .read()
            .reactions
            .iter()
            .find(|r| r.key() == *key)
            .cloned())
    }

    async fn insert_reaction(&self, reaction: &Reaction) -> Result<(), StoreError> {
        let racing = self.fires(StoreFault::RacingReactionInsert);
        let mut inner = self.inner.write();
        if racing {
            let mut rival = reaction.clone();
            rival.id = ReactionId::generate();
            inner.reactions.push(rival);
        }
        if inner.reactions.iter().any(|r| r.key() == reaction.key()) {
            return Err(StoreError::UniqueViolation {
                constraint: REACTION_CONSTRAINT.to_string(),
            });
        }
        inner.reactions.push(reaction.clone());
        Ok(())
    }

    async fn delete_reaction(&self, id: ReactionId) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let before = inner.reactions.len();
        inner.reactions.retain(|r| r.id != id);
        Ok(inner.reactions.len() != before)
    }

    async fn list_reactions(&self, targets: &[ReactionTarget]) -> Result<Vec<Reaction>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .reactions
            .iter()
            .filter(|r| targets.contains(&r.target))
            .cloned()
            .collect())
    }

    async fn count_reactions(
        &self,
        targets: &[ReactionTarget],
    ) -> Result<BTreeMap<ReactionTarget, u64>, StoreError> {
        let inner = self.inner.read();
        let mut counts = BTreeMap::new();
        for reaction in inner.reactions.iter().filter(|r| targets.contains(&r.target)) {
            *counts.entry(reaction.target).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
