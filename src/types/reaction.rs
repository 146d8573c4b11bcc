//! Reaction types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use super::ids::{PostId, ReactionId, ReplyId, UserId};

/// The fixed set of reaction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionType {
    /// Gratitude.
    Thanks,
    /// Amusement.
    Laugh,
    /// Confusion.
    Confused,
    /// Sadness.
    Sad,
    /// Anger.
    Angry,
    /// Affection.
    Love,
}

impl ReactionType {
    /// All kinds, in display order.
    pub const ALL: [ReactionType; 6] = [
        Self::Thanks,
        Self::Laugh,
        Self::Confused,
        Self::Sad,
        Self::Angry,
        Self::Love,
    ];

    /// Parse a reaction kind (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "THANKS" => Some(Self::Thanks),
            "LAUGH" => Some(Self::Laugh),
            "CONFUSED" => Some(Self::Confused),
            "SAD" => Some(Self::Sad),
            "ANGRY" => Some(Self::Angry),
            "LOVE" => Some(Self::Love),
            _ => None,
        }
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thanks => "THANKS",
            Self::Laugh => "LAUGH",
            Self::Confused => "CONFUSED",
            Self::Sad => "SAD",
            Self::Angry => "ANGRY",
            Self::Love => "LOVE",
        }
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminator for what a reaction is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionTargetType {
    /// Attached to a post.
    Post,
    /// Attached to a reply.
    Reply,
}

impl ReactionTargetType {
    /// Parse a target type (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "POST" => Some(Self::Post),
            "REPLY" => Some(Self::Reply),
            _ => None,
        }
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Reply => "REPLY",
        }
    }
}

impl fmt::Display for ReactionTargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity a reaction is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReactionTarget {
    /// A post.
    Post(PostId),
    /// A reply.
    Reply(ReplyId),
}

impl ReactionTarget {
    /// Build a target from its stored discriminator and raw id.
    pub fn from_parts(target_type: ReactionTargetType, id: Uuid) -> Self {
        match target_type {
            ReactionTargetType::Post => Self::Post(PostId::new(id)),
            ReactionTargetType::Reply => Self::Reply(ReplyId::new(id)),
        }
    }

    /// Discriminator of this target.
    pub fn target_type(&self) -> ReactionTargetType {
        match self {
            Self::Post(_) => ReactionTargetType::Post,
            Self::Reply(_) => ReactionTargetType::Reply,
        }
    }

    /// The raw id of the target.
    pub fn target_uuid(&self) -> Uuid {
        match self {
            Self::Post(id) => id.as_uuid(),
            Self::Reply(id) => id.as_uuid(),
        }
    }
}

impl fmt::Display for ReactionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_type(), self.target_uuid())
    }
}

/// Uniqueness key of a reaction row: at most one row per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReactionKey {
    /// What was reacted to.
    pub target: ReactionTarget,
    /// Who reacted.
    pub user_id: UserId,
    /// Reaction kind.
    pub reaction_type: ReactionType,
}

/// A stored reaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    /// Reaction id.
    pub id: ReactionId,
    /// What was reacted to.
    pub target: ReactionTarget,
    /// Who reacted.
    pub user_id: UserId,
    /// Reaction kind.
    pub reaction_type: ReactionType,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Reaction {
    /// Create a new reaction row for a key.
    pub fn new(key: ReactionKey, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ReactionId::generate(),
            target: key.target,
            user_id: key.user_id,
            reaction_type: key.reaction_type,
            created_at,
        }
    }

    /// The uniqueness key of this row.
    pub fn key(&self) -> ReactionKey {
        ReactionKey {
            target: self.target,
            user_id: self.user_id,
            reaction_type: self.reaction_type,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReactionWire {
    id: ReactionId,
    target_type: ReactionTargetType,
    target_id: Uuid,
    user_id: UserId,
    #[serde(rename = "type")]
    reaction_type: ReactionType,
    created_at: DateTime<Utc>,
}

impl Serialize for Reaction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ReactionWire {
            id: self.id,
            target_type: self.target.target_type(),
            target_id: self.target.target_uuid(),
            user_id: self.user_id,
            reaction_type: self.reaction_type,
            created_at: self.created_at,
        }
        .serialize(serializer)
    }
}

/// Result of a toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ToggleOutcome {
    /// No row existed; one was inserted.
    Added {
        /// The inserted row.
        reaction: Reaction,
    },
    /// A row existed and was deleted.
    Removed,
}

impl ToggleOutcome {
    /// Whether the toggle inserted a row.
    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added { .. })
    }
}

/// Per-type reaction tallies for one target.
///
/// Types with no reactions are absent from `counts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionCounts {
    /// Count per kind.
    pub counts: BTreeMap<ReactionType, u64>,
    /// Kinds applied by the viewing user (empty when anonymous).
    pub mine: BTreeSet<ReactionType>,
}

impl ReactionCounts {
    /// Sum over all kinds.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Count for one kind, zero when absent.
    pub fn get(&self, reaction_type: ReactionType) -> u64 {
        self.counts.get(&reaction_type).copied().unwrap_or(0)
    }

    /// Fold reactions into tallies, marking the viewer's own kinds.
    pub fn tally<'a>(
        reactions: impl IntoIterator<Item = &'a Reaction>,
        viewer: Option<UserId>,
    ) -> Self {
        let mut out = Self::default();
        for reaction in reactions {
            *out.counts.entry(reaction.reaction_type).or_insert(0) += 1;
            if viewer == Some(reaction.user_id) {
                out.mine.insert(reaction.reaction_type);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_type_parse_is_case_insensitive() {
        assert_eq!(ReactionType::from_str("thanks"), Some(ReactionType::Thanks));
        assert_eq!(ReactionType::from_str(" Love "), Some(ReactionType::Love));
        assert_eq!(ReactionType::from_str("LIKE"), None);
    }

    #[test]
    fn test_every_type_round_trips_through_storage_name() {
        for kind in ReactionType::ALL {
            assert_eq!(ReactionType::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_tally_counts_and_marks_viewer() {
        let post = ReactionTarget::Post(PostId::new(Uuid::from_u128(1)));
        let alice = UserId::new(Uuid::from_u128(10));
        let bob = UserId::new(Uuid::from_u128(11));
        let now = Utc::now();
        let rows = vec![
            Reaction::new(ReactionKey { target: post, user_id: alice, reaction_type: ReactionType::Thanks }, now),
            Reaction::new(ReactionKey { target: post, user_id: bob, reaction_type: ReactionType::Thanks }, now),
            Reaction::new(ReactionKey { target: post, user_id: bob, reaction_type: ReactionType::Sad }, now),
        ];

        let counts = ReactionCounts::tally(&rows, Some(alice));
        assert_eq!(counts.get(ReactionType::Thanks), 2);
        assert_eq!(counts.get(ReactionType::Sad), 1);
        assert_eq!(counts.get(ReactionType::Love), 0);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.mine.len(), 1);
        assert!(counts.mine.contains(&ReactionType::Thanks));
    }

    #[test]
    fn test_toggle_outcome_wire_shape() {
        let removed = serde_json::to_value(ToggleOutcome::Removed).unwrap();
        assert_eq!(removed, serde_json::json!({ "action": "removed" }));

        let key = ReactionKey {
            target: ReactionTarget::Reply(ReplyId::new(Uuid::from_u128(3))),
            user_id: UserId::new(Uuid::from_u128(4)),
            reaction_type: ReactionType::Laugh,
        };
        let added = serde_json::to_value(ToggleOutcome::Added {
            reaction: Reaction::new(key, Utc::now()),
        })
        .unwrap();
        assert_eq!(added["action"], "added");
        assert_eq!(added["reaction"]["targetType"], "REPLY");
        assert_eq!(added["reaction"]["type"], "LAUGH");
    }
}
