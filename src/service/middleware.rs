//! Request middleware: correlation ids, request spans and metric log lines.
//!
//! Metrics are emitted as structured log lines under the
//! `property_forum::metrics` target and aggregated downstream:
//!
//! - `request_metric`: path pattern, method, status, latency
//! - `forum_write_metric`: posts, replies and categories created
//! - `reaction_toggle_metric`: toggles by target type and outcome

use std::sync::OnceLock;
use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use regex_lite::Regex;
use tracing::{info, Instrument};
use uuid::Uuid;

/// Header carrying the correlation id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id of the current request, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Assign a correlation id, run the request inside a span and log its
/// metric line.
///
/// The id comes from `X-Request-Id` when the caller sent one, otherwise a
/// fresh UUID. It is echoed back on the response.
pub async fn request_context(mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    info!(
        target: "property_forum::metrics",
        metric_type = "request",
        request_id = %request_id,
        path = %path,
        method = %method,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request_metric"
    );

    response
}

fn uuid_segment() -> &'static Regex {
    static UUID_SEGMENT: OnceLock<Regex> = OnceLock::new();
    UUID_SEGMENT.get_or_init(|| {
        Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
            .expect("static pattern compiles")
    })
}

/// Replace UUID path segments with `:id` to keep metric cardinality low.
pub fn normalize_path(path: &str) -> String {
    uuid_segment().replace_all(path, ":id").into_owned()
}

/// Record a successful write (`post`, `reply` or `category`).
pub fn record_forum_write(entity: &'static str) {
    info!(
        target: "property_forum::metrics",
        metric_type = "forum_write",
        entity = entity,
        "forum_write_metric"
    );
}

/// Record a reaction toggle.
pub fn record_reaction_toggle(target_type: &'static str, added: bool) {
    info!(
        target: "property_forum::metrics",
        metric_type = "reaction_toggle",
        target_type = target_type,
        action = if added { "added" } else { "removed" },
        "reaction_toggle_metric"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_uuid() {
        let path = "/api/forum/categories/550e8400-e29b-41d4-a716-446655440000/breadcrumb";
        assert_eq!(normalize_path(path), "/api/forum/categories/:id/breadcrumb");
    }

    #[test]
    fn test_normalize_path_preserves_slugs() {
        assert_eq!(normalize_path("/api/forum/posts/hello-world-1"), "/api/forum/posts/hello-world-1");
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
    }
}
