//! Caller identity as supplied by the marketplace's identity service.
//!
//! The forum never issues credentials. An upstream gateway authenticates the
//! user and forwards who they are; when that assertion crosses a network hop
//! it is signed with a shared secret (HMAC-SHA256) so the forum can trust it.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::ForumError;
use crate::types::{User, UserId};

/// Verified-user identity for the current caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Marketplace user id.
    pub user_id: UserId,
    /// The user confirmed their email address.
    pub is_email_verified: bool,
    /// The user confirmed their mobile number.
    pub is_mobile_verified: bool,
    /// Public display name, when the gateway forwards one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Identity {
    /// Identity without a display name.
    pub fn new(user_id: UserId, is_email_verified: bool, is_mobile_verified: bool) -> Self {
        Self {
            user_id,
            is_email_verified,
            is_mobile_verified,
            display_name: None,
        }
    }

    /// Attach the caller's display name. Blank names are ignored.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim();
        self.display_name = (!name.is_empty()).then(|| name.to_string());
        self
    }

    /// Identity with a verified email.
    pub fn verified(user_id: UserId) -> Self {
        Self::new(user_id, true, false)
    }

    /// Identity with neither email nor mobile verified.
    pub fn unverified(user_id: UserId) -> Self {
        Self::new(user_id, false, false)
    }

    /// At least one contact channel is verified.
    pub fn is_verified(&self) -> bool {
        self.is_email_verified || self.is_mobile_verified
    }

    /// Author row for this caller, if a display name is known.
    pub fn profile(&self) -> Option<User> {
        self.display_name
            .as_ref()
            .map(|name| User::new(self.user_id, name.clone()))
    }

    /// Canonical string covered by the gateway signature.
    ///
    /// `user|email|mobile|name`, with an empty name segment when absent.
    fn canonical_string(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.user_id,
            u8::from(self.is_email_verified),
            u8::from(self.is_mobile_verified),
            self.display_name.as_deref().unwrap_or("")
        )
    }

    /// Sign this identity (gateway side, and tests).
    pub fn sign(&self, secret: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret)
            .expect("HMAC accepts any key size");
        mac.update(self.canonical_string().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a hex signature in constant time.
    pub fn verify_signature(&self, secret: &[u8], signature: &str) -> bool {
        let Ok(bytes) = hex::decode(signature.trim()) else {
            return false;
        };
        let mut mac = Hmac::<Sha256>::new_from_slice(secret)
            .expect("HMAC accepts any key size");
        mac.update(self.canonical_string().as_bytes());
        mac.verify_slice(&bytes).is_ok()
    }
}

/// Require a caller identity (401 otherwise).
pub fn require_authenticated(caller: Option<&Identity>) -> Result<&Identity, ForumError> {
    caller.ok_or_else(|| ForumError::Auth("Authentication required".to_string()))
}

/// Require a caller with a verified email or mobile number (401, then 403).
pub fn require_verified(caller: Option<&Identity>) -> Result<&Identity, ForumError> {
    let identity = require_authenticated(caller)?;
    if !identity.is_verified() {
        return Err(ForumError::Forbidden(
            "Verify your email or mobile number to participate".to_string(),
        ));
    }
    Ok(identity)
}
