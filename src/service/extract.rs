//! Caller identity extraction from gateway headers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::identity::Identity;
use crate::store::ForumStore;
use crate::types::UserId;

use super::state::ServiceState;

/// Header carrying the caller's user id.
pub const USER_HEADER: &str = "x-forum-user";
/// Header carrying the email verification flag.
pub const EMAIL_VERIFIED_HEADER: &str = "x-forum-email-verified";
/// Header carrying the mobile verification flag.
pub const MOBILE_VERIFIED_HEADER: &str = "x-forum-mobile-verified";
/// Header carrying the caller's display name (UTF-8, optional).
pub const USER_NAME_HEADER: &str = "x-forum-user-name";
/// Header carrying the hex HMAC-SHA256 over the values above.
pub const SIGNATURE_HEADER: &str = "x-forum-identity-signature";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn utf8_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn flag(headers: &HeaderMap, name: &str) -> bool {
    header(headers, name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Resolve the caller from identity headers.
///
/// No user header means anonymous. A malformed id or a missing or wrong
/// signature is also anonymous, with a warning.
pub fn identity_from_headers(headers: &HeaderMap, secret: &[u8]) -> Option<Identity> {
    let raw_user = header(headers, USER_HEADER)?;
    let user_id = match UserId::parse(raw_user) {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!(user = %raw_user, "malformed identity header; treating caller as anonymous");
            return None;
        }
    };

    let mut identity = Identity::new(
        user_id,
        flag(headers, EMAIL_VERIFIED_HEADER),
        flag(headers, MOBILE_VERIFIED_HEADER),
    );
    if let Some(name) = utf8_header(headers, USER_NAME_HEADER) {
        identity = identity.with_display_name(name);
    }

    match header(headers, SIGNATURE_HEADER) {
        Some(signature) if identity.verify_signature(secret, signature) => Some(identity),
        _ => {
            tracing::warn!(user_id = %user_id, "identity signature missing or invalid; treating caller as anonymous");
            None
        }
    }
}

/// The caller of a request, if the gateway vouched for one.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<Identity>);

impl Caller {
    /// The verified identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }

    /// Viewer used to mark the caller's own reactions.
    pub fn viewer(&self) -> Option<UserId> {
        self.0.as_ref().map(|identity| identity.user_id)
    }
}

#[async_trait]
impl<S: ForumStore + 'static> FromRequestParts<Arc<ServiceState<S>>> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServiceState<S>>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Caller(identity_from_headers(&parts.headers, state.identity_secret())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &[u8] = b"test_gateway_secret";

    fn signed(identity: &Identity) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_str(&identity.user_id.to_string()).unwrap());
        headers.insert(
            EMAIL_VERIFIED_HEADER,
            HeaderValue::from_static(if identity.is_email_verified { "true" } else { "false" }),
        );
        headers.insert(
            MOBILE_VERIFIED_HEADER,
            HeaderValue::from_static(if identity.is_mobile_verified { "1" } else { "0" }),
        );
        if let Some(name) = &identity.display_name {
            headers.insert(USER_NAME_HEADER, HeaderValue::from_bytes(name.as_bytes()).unwrap());
        }
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&identity.sign(SECRET)).unwrap());
        headers
    }

    #[test]
    fn test_signed_headers_resolve() {
        let identity = Identity::new(UserId::generate(), false, true);
        assert_eq!(identity_from_headers(&signed(&identity), SECRET), Some(identity));
    }

    #[test]
    fn test_display_name_is_carried_and_signed() {
        let identity = Identity::verified(UserId::generate()).with_display_name("Zoë Adébayo");
        let headers = signed(&identity);
        let resolved = identity_from_headers(&headers, SECRET).unwrap();
        assert_eq!(resolved.display_name.as_deref(), Some("Zoë Adébayo"));

        let mut renamed = headers;
        renamed.insert(USER_NAME_HEADER, HeaderValue::from_static("Admin"));
        assert_eq!(identity_from_headers(&renamed, SECRET), None);
    }

    #[test]
    fn test_missing_user_is_anonymous() {
        assert_eq!(identity_from_headers(&HeaderMap::new(), SECRET), None);
    }

    #[test]
    fn test_tampered_flags_are_rejected() {
        let identity = Identity::unverified(UserId::generate());
        let mut headers = signed(&identity);
        headers.insert(EMAIL_VERIFIED_HEADER, HeaderValue::from_static("true"));
        assert_eq!(identity_from_headers(&headers, SECRET), None);
    }

    #[test]
    fn test_unsigned_or_malformed_is_anonymous() {
        let identity = Identity::verified(UserId::generate());
        let mut headers = signed(&identity);
        headers.remove(SIGNATURE_HEADER);
        assert_eq!(identity_from_headers(&headers, SECRET), None);

        let mut headers = signed(&identity);
        headers.insert(USER_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert_eq!(identity_from_headers(&headers, SECRET), None);
    }
}
