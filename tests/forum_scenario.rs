//! End-to-end forum behavior against the in-memory store.

use std::sync::Arc;

use property_forum::{
    Forum, Identity, InMemoryForumStore, NewCategory, PostDraft, ReactionTarget, ReactionType,
    ReplyDraft, ReplyNode, SearchParams, StoreFault, ToggleOutcome, User, UserId,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

struct Harness {
    store: Arc<InMemoryForumStore>,
    forum: Forum<InMemoryForumStore>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryForumStore::new());
    Harness {
        forum: Forum::new(Arc::clone(&store)),
        store,
    }
}

fn member(h: &Harness, name: &str) -> Identity {
    let id = UserId::generate();
    h.store.add_user(User::new(id, name));
    Identity::verified(id)
}

fn max_depth(nodes: &[ReplyNode]) -> usize {
    nodes
        .iter()
        .map(|n| n.depth.max(max_depth(&n.children)))
        .max()
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_thread_lifecycle() {
    let h = harness();
    let alice = member(&h, "Alice");
    let bob = member(&h, "Bob");

    let general = h
        .forum
        .categories
        .create(NewCategory::named("General", 1))
        .await
        .unwrap();
    assert_eq!(general.slug, "general");

    let created = h
        .forum
        .posts
        .create(alice.user_id, PostDraft::new("Hello World", "First post", general.id))
        .await
        .unwrap();
    assert_eq!(created.post.slug, "hello-world");

    let detail = h.forum.posts.get_by_slug("hello-world", None).await.unwrap();
    assert_eq!(detail.post.view_count, 1);
    assert_eq!(detail.author.name, "Alice");
    assert_eq!(detail.breadcrumb[0].slug, "general");

    let reply = h
        .forum
        .replies
        .create(bob.user_id, ReplyDraft::new(created.post.id, "Welcome!"))
        .await
        .unwrap();

    let detail = h.forum.posts.get_by_slug("hello-world", None).await.unwrap();
    assert_eq!(detail.post.reply_count, 1);
    assert!(detail.post.last_reply_at.is_some());
    assert_eq!(detail.replies.len(), 1);
    assert_eq!(detail.replies[0].view.author.name, "Bob");

    let target = ReactionTarget::Reply(reply.reply.id);
    let outcome = h
        .forum
        .reactions
        .toggle(Some(&alice), target, ReactionType::Thanks)
        .await
        .unwrap();
    assert!(outcome.is_added());

    let counts = h.forum.reactions.counts_for(target, None).await.unwrap();
    assert_eq!(counts.get(ReactionType::Thanks), 1);
    assert_eq!(counts.counts.len(), 1);

    let outcome = h
        .forum
        .reactions
        .toggle(Some(&alice), target, ReactionType::Thanks)
        .await
        .unwrap();
    assert_eq!(outcome, ToggleOutcome::Removed);

    let counts = h.forum.reactions.counts_for(target, None).await.unwrap();
    assert!(counts.counts.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_toggle_twice_restores_reaction_set() {
    let h = harness();
    let alice = member(&h, "Alice");
    let bob = member(&h, "Bob");
    let general = h.forum.categories.create(NewCategory::named("General", 1)).await.unwrap();
    let post = h
        .forum
        .posts
        .create(alice.user_id, PostDraft::new("Thread", "body", general.id))
        .await
        .unwrap();
    let target = ReactionTarget::Post(post.post.id);

    h.forum.reactions.toggle(Some(&bob), target, ReactionType::Love).await.unwrap();
    let before = h.forum.reactions.counts_for(target, Some(bob.user_id)).await.unwrap();
    let stored_before = h.store.num_reactions();

    for _ in 0..2 {
        h.forum
            .reactions
            .toggle(Some(&alice), target, ReactionType::Laugh)
            .await
            .unwrap();
    }

    let after = h.forum.reactions.counts_for(target, Some(bob.user_id)).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(h.store.num_reactions(), stored_before);
    assert!(after.mine.contains(&ReactionType::Love));
}

#[tokio::test]
async fn test_locked_post_rejects_replies_without_touching_counter() {
    let h = harness();
    let alice = member(&h, "Alice");
    let general = h.forum.categories.create(NewCategory::named("General", 1)).await.unwrap();
    let post = h
        .forum
        .posts
        .create(alice.user_id, PostDraft::new("Closed", "body", general.id))
        .await
        .unwrap();
    assert!(h.store.set_locked(post.post.id, true));

    let err = h
        .forum
        .replies
        .create(alice.user_id, ReplyDraft::new(post.post.id, "late"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    let post = h.forum.posts.find_by_slug("closed").await.unwrap();
    assert_eq!(post.reply_count, 0);
    assert_eq!(h.store.num_replies(), 0);
}

#[tokio::test]
async fn test_failed_counter_update_rolls_back_reply() {
    let h = harness();
    let alice = member(&h, "Alice");
    let general = h.forum.categories.create(NewCategory::named("General", 1)).await.unwrap();
    let post = h
        .forum
        .posts
        .create(alice.user_id, PostDraft::new("Atomic", "body", general.id))
        .await
        .unwrap();

    h.store.arm(StoreFault::ReplyCounterUpdate);
    let err = h
        .forum
        .replies
        .create(alice.user_id, ReplyDraft::new(post.post.id, "lost"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 500);
    assert_eq!(err.public_message(), "Internal server error");
    assert_eq!(h.store.num_replies(), 0);
    assert_eq!(h.forum.posts.find_by_slug("atomic").await.unwrap().reply_count, 0);
}

#[tokio::test]
async fn test_reply_tree_display_is_capped() {
    let h = harness();
    let alice = member(&h, "Alice");
    let general = h.forum.categories.create(NewCategory::named("General", 1)).await.unwrap();
    let post = h
        .forum
        .posts
        .create(alice.user_id, PostDraft::new("Deep", "body", general.id))
        .await
        .unwrap();

    let mut parent = None;
    for i in 0..6 {
        let mut draft = ReplyDraft::new(post.post.id, format!("level {}", i));
        if let Some(id) = parent {
            draft = draft.answering(id);
        }
        let reply = h.forum.replies.create(alice.user_id, draft).await.unwrap();
        parent = Some(reply.reply.id);
    }

    let detail = h.forum.posts.get_by_slug("deep", None).await.unwrap();
    assert_eq!(detail.replies.len(), 1);
    assert_eq!(max_depth(&detail.replies), 2);
    assert_eq!(detail.post.reply_count, 6);
}

#[tokio::test]
async fn test_search_query_validation_and_trimming() {
    let h = harness();
    let err = h.forum.search.search(&SearchParams::query("a")).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert!(err.to_string().contains("at least 2 characters"));

    let results = h.forum.search.search(&SearchParams::query("  test  ")).await.unwrap();
    assert_eq!(results.query, "test");
    assert_eq!(results.total_results, 0);
}

#[tokio::test]
async fn test_search_all_sums_posts_and_categories() {
    let h = harness();
    let alice = member(&h, "Alice");
    let general = h.forum.categories.create(NewCategory::named("General", 1)).await.unwrap();
    for name in ["Test Alpha", "Test Beta", "Testing Gamma"] {
        h.forum.categories.create(NewCategory::named(name, 2)).await.unwrap();
    }
    for title in ["Test one", "Another test"] {
        h.forum
            .posts
            .create(alice.user_id, PostDraft::new(title, "body", general.id))
            .await
            .unwrap();
    }

    let results = h
        .forum
        .search
        .search(&SearchParams::query("test").kind("all"))
        .await
        .unwrap();
    assert_eq!(results.posts.len(), 2);
    assert_eq!(results.categories.len(), 3);
    assert_eq!(results.total_results, 5);
}

#[tokio::test]
async fn test_list_tree_shows_active_categories_in_display_order() {
    let h = harness();
    let beta = h.forum.categories.create(NewCategory::named("Beta", 2)).await.unwrap();
    let alpha = h.forum.categories.create(NewCategory::named("Alpha", 1)).await.unwrap();
    h.forum
        .categories
        .create(NewCategory::named("Hidden", 0).inactive())
        .await
        .unwrap();
    h.forum
        .categories
        .create(NewCategory::named("Rentals", 2).under(alpha.id))
        .await
        .unwrap();
    h.forum
        .categories
        .create(NewCategory::named("Archived", 1).under(alpha.id).inactive())
        .await
        .unwrap();
    h.forum
        .categories
        .create(NewCategory::named("Sales", 1).under(alpha.id))
        .await
        .unwrap();

    let tree = h.forum.categories.list_tree().await.unwrap();
    let roots: Vec<_> = tree.iter().map(|n| n.category.name.as_str()).collect();
    assert_eq!(roots, vec!["Alpha", "Beta"]);
    assert_eq!(tree[1].category.id, beta.id);

    let children: Vec<_> = tree[0].children.iter().map(|n| n.category.name.as_str()).collect();
    assert_eq!(children, vec!["Sales", "Rentals"]);
}
