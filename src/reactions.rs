//! Toggled reactions on posts and replies.
//!
//! A second reaction with the same (target, user, kind) removes the first.
//! The store's uniqueness constraint is the safety net for the
//! check-then-act sequence: losing an insert race is resolved by re-reading
//! and acting on what is actually there.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{ForumError, ForumResult};
use crate::identity::{require_authenticated, Identity};
use crate::projection::{non_blank, require_fields};
use crate::store::{ForumStore, REACTION_CONSTRAINT};
use crate::types::{
    Reaction, ReactionCounts, ReactionKey, ReactionTarget, ReactionTargetType, ReactionType,
    ToggleOutcome, UserId,
};

/// Read/act rounds a toggle attempts before giving up.
pub const TOGGLE_ROUNDS: u32 = 3;

/// Parse the raw fields of a toggle request.
///
/// All three must be present; the id must be a UUID and both enums must be
/// known values.
pub fn parse_toggle_request(
    target_type: Option<&str>,
    target_id: Option<&str>,
    reaction_type: Option<&str>,
) -> ForumResult<(ReactionTarget, ReactionType)> {
    let target_type = non_blank(target_type);
    let target_id = non_blank(target_id);
    let reaction_type = non_blank(reaction_type);
    require_fields(&[
        ("targetType", target_type.is_some()),
        ("targetId", target_id.is_some()),
        ("type", reaction_type.is_some()),
    ])?;
    let target_type = target_type.unwrap_or_default();
    let target_id = target_id.unwrap_or_default();
    let reaction_type = reaction_type.unwrap_or_default();

    let target_type = ReactionTargetType::from_str(target_type)
        .ok_or_else(|| ForumError::validation(format!("Unknown target type: {}", target_type)))?;
    let target_id = uuid::Uuid::parse_str(target_id)
        .map_err(|_| ForumError::validation(format!("Invalid targetId: {}", target_id)))?;
    let reaction_type = ReactionType::from_str(reaction_type)
        .ok_or_else(|| ForumError::validation(format!("Unknown reaction type: {}", reaction_type)))?;

    Ok((ReactionTarget::from_parts(target_type, target_id), reaction_type))
}

/// Reaction ledger.
pub struct ReactionLedger<S: ForumStore> {
    store: Arc<S>,
}

impl<S: ForumStore> ReactionLedger<S> {
    /// Create a ledger over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Toggle `reaction_type` by the caller on `target`.
    ///
    /// Removes the caller's reaction of that kind if present, adds it
    /// otherwise. Requires an authenticated caller; the target must exist.
    pub async fn toggle(
        &self,
        caller: Option<&Identity>,
        target: ReactionTarget,
        reaction_type: ReactionType,
    ) -> ForumResult<ToggleOutcome> {
        let user_id = require_authenticated(caller)?.user_id;
        self.ensure_target_exists(target).await?;

        let key = ReactionKey {
            target,
            user_id,
            reaction_type,
        };

        for round in 1..=TOGGLE_ROUNDS {
            if let Some(existing) = self.store.find_reaction(&key).await? {
                let deleted = self.store.delete_reaction(existing.id).await?;
                tracing::debug!(%target, user_id = %user_id, kind = %reaction_type, deleted, "reaction removed");
                return Ok(ToggleOutcome::Removed);
            }

            let reaction = Reaction::new(key, Utc::now());
            match self.store.insert_reaction(&reaction).await {
                Ok(()) => {
                    tracing::debug!(%target, user_id = %user_id, kind = %reaction_type, "reaction added");
                    return Ok(ToggleOutcome::Added { reaction });
                }
                Err(err) if err.violates(REACTION_CONSTRAINT) => {
                    tracing::debug!(%target, user_id = %user_id, round, "concurrent reaction insert; re-reading");
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::warn!(%target, user_id = %user_id, kind = %reaction_type, "reaction toggle did not settle");
        Err(ForumError::Conflict(
            "Reaction changed concurrently; please retry".to_string(),
        ))
    }

    async fn ensure_target_exists(&self, target: ReactionTarget) -> ForumResult<()> {
        let found = match target {
            ReactionTarget::Post(id) => self.store.get_post(id).await?.is_some(),
            ReactionTarget::Reply(id) => self.store.get_reply(id).await?.is_some(),
        };
        if found {
            Ok(())
        } else {
            let entity = match target {
                ReactionTarget::Post(_) => "post",
                ReactionTarget::Reply(_) => "reply",
            };
            Err(ForumError::not_found(entity, target.target_uuid()))
        }
    }

    /// Per-kind tallies on `target`, with the kinds `viewer` applied.
    pub async fn counts_for(
        &self,
        target: ReactionTarget,
        viewer: Option<UserId>,
    ) -> ForumResult<ReactionCounts> {
        let reactions = self.store.list_reactions(&[target]).await?;
        Ok(ReactionCounts::tally(&reactions, viewer))
    }

    /// Tallies for many targets in one read. Every requested target has an
    /// entry, empty when nobody reacted.
    pub async fn counts_for_many(
        &self,
        targets: &[ReactionTarget],
        viewer: Option<UserId>,
    ) -> ForumResult<BTreeMap<ReactionTarget, ReactionCounts>> {
        let mut grouped: BTreeMap<ReactionTarget, Vec<Reaction>> =
            targets.iter().map(|t| (*t, Vec::new())).collect();
        if targets.is_empty() {
            return Ok(BTreeMap::new());
        }

        for reaction in self.store.list_reactions(targets).await? {
            if let Some(bucket) = grouped.get_mut(&reaction.target) {
                bucket.push(reaction);
            }
        }

        Ok(grouped
            .into_iter()
            .map(|(target, reactions)| (target, ReactionCounts::tally(&reactions, viewer)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryForumStore, StoreFault};
    use crate::types::{CategoryId, Post, PostId};

    async fn ledger_with_post() -> (Arc<InMemoryForumStore>, ReactionLedger<InMemoryForumStore>, PostId) {
        let store = Arc::new(InMemoryForumStore::new());
        let post = Post::new(
            "Title".into(),
            "Body".into(),
            "title".into(),
            CategoryId::generate(),
            UserId::generate(),
            Utc::now(),
        );
        store.insert_post(&post).await.unwrap();
        let ledger = ReactionLedger::new(Arc::clone(&store));
        (store, ledger, post.id)
    }

    #[tokio::test]
    async fn test_toggle_is_an_involution() {
        let (store, ledger, post_id) = ledger_with_post().await;
        let caller = Identity::verified(UserId::generate());
        let target = ReactionTarget::Post(post_id);

        let first = ledger.toggle(Some(&caller), target, ReactionType::Thanks).await.unwrap();
        assert!(first.is_added());
        let counts = ledger.counts_for(target, Some(caller.user_id)).await.unwrap();
        assert_eq!(counts.get(ReactionType::Thanks), 1);
        assert!(counts.mine.contains(&ReactionType::Thanks));

        let second = ledger.toggle(Some(&caller), target, ReactionType::Thanks).await.unwrap();
        assert_eq!(second, ToggleOutcome::Removed);
        assert!(ledger.counts_for(target, None).await.unwrap().counts.is_empty());
        assert_eq!(store.num_reactions(), 0);
    }

    #[tokio::test]
    async fn test_kinds_are_independent() {
        let (_, ledger, post_id) = ledger_with_post().await;
        let caller = Identity::verified(UserId::generate());
        let target = ReactionTarget::Post(post_id);

        ledger.toggle(Some(&caller), target, ReactionType::Love).await.unwrap();
        ledger.toggle(Some(&caller), target, ReactionType::Laugh).await.unwrap();

        let counts = ledger.counts_for(target, Some(caller.user_id)).await.unwrap();
        assert_eq!(counts.total(), 2);
        assert_eq!(counts.mine.len(), 2);
    }

    #[tokio::test]
    async fn test_lost_insert_race_becomes_removal() {
        let (store, ledger, post_id) = ledger_with_post().await;
        let caller = Identity::verified(UserId::generate());

        store.arm(StoreFault::RacingReactionInsert);
        let outcome = ledger
            .toggle(Some(&caller), ReactionTarget::Post(post_id), ReactionType::Sad)
            .await
            .unwrap();
        assert_eq!(outcome, ToggleOutcome::Removed);
        assert_eq!(store.num_reactions(), 0);
    }

    #[tokio::test]
    async fn test_toggle_requires_identity_and_target() {
        let (_, ledger, _) = ledger_with_post().await;
        let target = ReactionTarget::Post(PostId::generate());

        let err = ledger.toggle(None, target, ReactionType::Thanks).await.unwrap_err();
        assert_eq!(err.status_code(), 401);

        let caller = Identity::unverified(UserId::generate());
        let err = ledger.toggle(Some(&caller), target, ReactionType::Thanks).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_parse_toggle_request() {
        let id = uuid::Uuid::from_u128(7);
        let (target, kind) =
            parse_toggle_request(Some("reply"), Some(&id.to_string()), Some("love")).unwrap();
        assert_eq!(target.target_type(), ReactionTargetType::Reply);
        assert_eq!(kind, ReactionType::Love);

        let err = parse_toggle_request(Some("POST"), None, Some("")).unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields: targetId, type");

        let err = parse_toggle_request(Some("POST"), Some("nope"), Some("LOVE")).unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = parse_toggle_request(Some("POST"), Some(&id.to_string()), Some("LIKE")).unwrap_err();
        assert!(err.to_string().contains("Unknown reaction type"));
    }
}
