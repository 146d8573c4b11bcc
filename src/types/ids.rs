//! Identifier types for forum entities.
//!
//! Every entity is keyed by a UUID wrapped in its own newtype so a reply id
//! can never be passed where a post id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID.
            pub fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse from the hyphenated UUID form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s.trim())?))
            }

            /// Get the inner UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

entity_id!(
    /// Identifier of a discussion category.
    CategoryId
);
entity_id!(
    /// Identifier of a post (thread starter).
    PostId
);
entity_id!(
    /// Identifier of a reply under a post.
    ReplyId
);
entity_id!(
    /// Identifier of a reaction row.
    ReactionId
);
entity_id!(
    /// Identifier of a marketplace user, issued by the identity service.
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_display() {
        let id = PostId::new(Uuid::from_u128(42));
        let parsed = PostId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CategoryId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_serializes_as_bare_uuid() {
        let id = UserId::new(Uuid::from_u128(7));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", Uuid::from_u128(7)));
    }
}
