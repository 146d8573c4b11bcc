//! Forum error taxonomy.
//!
//! Every component operation returns [`ForumError`]. Store failures are
//! converted at the operation boundary into [`ForumError::Internal`]; the
//! driver detail is logged and never shown to callers.

use crate::store::StoreError;

/// Message shown to callers for any internal failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Error type for forum operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForumError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),
    /// No caller identity.
    #[error("{0}")]
    Auth(String),
    /// Identity present but not allowed (unverified caller, locked post).
    #[error("{0}")]
    Forbidden(String),
    /// Unknown slug, category, post, or reply.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of entity that was looked up.
        entity: &'static str,
        /// The key that did not resolve.
        key: String,
    },
    /// Slug space exhausted or an unresolvable concurrent write.
    #[error("{0}")]
    Conflict(String),
    /// Store or transport failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ForumError {
    /// Validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Not-found error for an entity kind and key.
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Auth(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound { .. } => 404,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Auth(_) => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Caller-visible message. Internal detail is replaced by a generic text.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for ForumError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "store operation failed");
        Self::Internal(err.to_string())
    }
}

/// Result alias for forum operations.
pub type ForumResult<T> = Result<T, ForumError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ForumError::validation("x").status_code(), 400);
        assert_eq!(ForumError::Auth("x".into()).status_code(), 401);
        assert_eq!(ForumError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(ForumError::not_found("post", "slug").status_code(), 404);
        assert_eq!(ForumError::Conflict("x".into()).status_code(), 409);
        assert_eq!(ForumError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_store_errors_do_not_leak() {
        let err: ForumError = StoreError::Backend("connection reset by peer".into()).into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), INTERNAL_ERROR_MESSAGE);
        assert!(!err.public_message().contains("peer"));
    }

    #[test]
    fn test_not_found_message() {
        let err = ForumError::not_found("post", "hello-world");
        assert_eq!(err.public_message(), "post not found: hello-world");
    }
}
