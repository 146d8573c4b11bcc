//! Axum routes for the forum service.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Json, Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ForumError, ForumResult};
use crate::identity::{require_authenticated, require_verified};
use crate::pagination::{resolve, PageDefaults};
use crate::reactions::parse_toggle_request;
use crate::search::{SearchParams, SearchResults};
use crate::store::ForumStore;
use crate::types::{
    Category, CategoryId, CategoryNode, CategorySummary, NewCategory, PostDetail, PostDraft,
    PostId, PostPage, PostSummary, ReactionTargetType, ReplyDraft, ReplyId, ReplyPage, ReplyView,
    ToggleOutcome,
};

use super::extract::Caller;
use super::middleware::{record_forum_write, record_reaction_toggle, request_context, RequestId};
use super::state::ServiceState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /api/forum/posts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    /// Post title.
    pub title: Option<String>,
    /// Post body.
    pub content: Option<String>,
    /// Target category.
    pub category_id: Option<String>,
}

impl CreatePostRequest {
    fn into_draft(self) -> ForumResult<PostDraft> {
        Ok(PostDraft {
            category_id: optional_id(self.category_id.as_deref(), "categoryId", CategoryId::parse)?,
            title: self.title,
            content: self.content,
        })
    }
}

/// Body of `POST /api/forum/replies`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReplyRequest {
    /// Post being answered.
    pub post_id: Option<String>,
    /// Reply body.
    pub content: Option<String>,
    /// Reply being answered, if any.
    pub parent_id: Option<String>,
}

impl CreateReplyRequest {
    fn into_draft(self) -> ForumResult<ReplyDraft> {
        Ok(ReplyDraft {
            post_id: optional_id(self.post_id.as_deref(), "postId", PostId::parse)?,
            parent_id: optional_id(self.parent_id.as_deref(), "parentId", ReplyId::parse)?,
            content: self.content,
        })
    }
}

/// Body of the reaction toggle endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleReactionRequest {
    /// Post or reply id.
    pub target_id: Option<String>,
    /// Reaction kind, e.g. `THANKS`.
    #[serde(rename = "type")]
    pub reaction_type: Option<String>,
}

/// Query of `GET /api/forum/posts`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostsQuery {
    /// Only posts in this category.
    pub category_id: Option<String>,
    /// Requested page.
    pub page: Option<String>,
    /// Requested page size.
    pub limit: Option<String>,
}

/// Query of `GET /api/forum/posts/{slug}/replies`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyPageQuery {
    /// Requested page.
    pub page: Option<String>,
}

/// The active category tree.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTreeResponse {
    /// Root categories with their descendants.
    pub categories: Vec<CategoryNode>,
}

/// Root-to-leaf path of a category.
#[derive(Debug, Clone, Serialize)]
pub struct BreadcrumbResponse {
    /// Root first.
    pub breadcrumb: Vec<CategorySummary>,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Whether the store answered a ping.
    pub database: bool,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always `alive`.
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Whether the service can take traffic.
    pub ready: bool,
    /// Whether the store answered a ping.
    pub database: bool,
    /// Why the service is not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Structured error response with correlation ID for tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Correlation ID of the failed request (`X-Request-Id` or generated).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            correlation_id: None,
        }
    }

    /// Add a correlation ID to the error.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

impl From<&ForumError> for ErrorResponse {
    fn from(err: &ForumError) -> Self {
        Self::new(err.code(), err.public_message())
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

/// Render a forum error with its mapped status.
fn reject(err: ForumError, correlation_id: Option<&str>) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = %err, correlation_id = ?correlation_id, "request failed");
    } else {
        tracing::debug!(code = err.code(), error = %err, correlation_id = ?correlation_id, "request rejected");
    }

    let mut body = ErrorResponse::from(&err);
    if let Some(id) = correlation_id {
        body = body.with_correlation_id(id);
    }
    (status, Json(body))
}

fn correlation(request_id: Option<Extension<RequestId>>) -> Option<String> {
    request_id.map(|Extension(RequestId(id))| id)
}

fn body_error(rejection: JsonRejection) -> ForumError {
    ForumError::validation(format!("Invalid request body: {}", rejection.body_text()))
}

fn query_error(rejection: QueryRejection) -> ForumError {
    ForumError::validation(format!("Invalid query string: {}", rejection.body_text()))
}

fn optional_id<T>(
    raw: Option<&str>,
    field: &str,
    parse: impl Fn(&str) -> Result<T, uuid::Error>,
) -> ForumResult<Option<T>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => parse(raw)
            .map(Some)
            .map_err(|_| ForumError::validation(format!("Invalid {}: {}", field, raw))),
    }
}

// ============================================================================
// Category Handlers
// ============================================================================

async fn list_categories<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    request_id: Option<Extension<RequestId>>,
) -> ApiResult<Json<CategoryTreeResponse>> {
    let correlation_id = correlation(request_id);
    let categories = state
        .forum
        .categories
        .list_tree()
        .await
        .map_err(|e| reject(e, correlation_id.as_deref()))?;
    Ok(Json(CategoryTreeResponse { categories }))
}

async fn create_category<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    caller: Caller,
    request_id: Option<Extension<RequestId>>,
    body: Result<Json<NewCategory>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let correlation_id = correlation(request_id);
    let fail = |e: ForumError| reject(e, correlation_id.as_deref());

    require_verified(caller.identity()).map_err(fail)?;
    let Json(new) = body.map_err(body_error).map_err(fail)?;
    let category = state.forum.categories.create(new).await.map_err(fail)?;

    record_forum_write("category");
    Ok((StatusCode::CREATED, Json(category)))
}

async fn category_breadcrumb<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(id): Path<String>,
    request_id: Option<Extension<RequestId>>,
) -> ApiResult<Json<BreadcrumbResponse>> {
    let correlation_id = correlation(request_id);
    let fail = |e: ForumError| reject(e, correlation_id.as_deref());

    let id = CategoryId::parse(&id)
        .map_err(|_| ForumError::validation(format!("Invalid category id: {}", id)))
        .map_err(fail)?;
    let breadcrumb = state
        .forum
        .categories
        .resolve_breadcrumb(id)
        .await
        .map_err(fail)?;
    Ok(Json(BreadcrumbResponse { breadcrumb }))
}

// ============================================================================
// Post Handlers
// ============================================================================

async fn list_posts<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    request_id: Option<Extension<RequestId>>,
    query: Result<Query<ListPostsQuery>, QueryRejection>,
) -> ApiResult<Json<PostPage>> {
    let correlation_id = correlation(request_id);
    let fail = |e: ForumError| reject(e, correlation_id.as_deref());

    let Query(query) = query.map_err(query_error).map_err(fail)?;
    let category_id =
        optional_id(query.category_id.as_deref(), "categoryId", CategoryId::parse).map_err(fail)?;
    let page = resolve(
        query.page.as_deref(),
        query.limit.as_deref(),
        PageDefaults::default(),
    );

    let listing = state
        .forum
        .posts
        .list(category_id, page)
        .await
        .map_err(fail)?;
    Ok(Json(listing))
}

async fn create_post<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    caller: Caller,
    request_id: Option<Extension<RequestId>>,
    body: Result<Json<CreatePostRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PostSummary>)> {
    let correlation_id = correlation(request_id);
    let fail = |e: ForumError| reject(e, correlation_id.as_deref());

    let identity = require_verified(caller.identity()).map_err(fail)?;
    let Json(request) = body.map_err(body_error).map_err(fail)?;
    let draft = request.into_draft().map_err(fail)?;
    state.forum.sync_author(identity).await.map_err(fail)?;
    let created = state
        .forum
        .posts
        .create(identity.user_id, draft)
        .await
        .map_err(fail)?;

    record_forum_write("post");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_post<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(slug): Path<String>,
    caller: Caller,
    request_id: Option<Extension<RequestId>>,
) -> ApiResult<Json<PostDetail>> {
    let correlation_id = correlation(request_id);
    let detail = state
        .forum
        .posts
        .get_by_slug(&slug, caller.viewer())
        .await
        .map_err(|e| reject(e, correlation_id.as_deref()))?;
    Ok(Json(detail))
}

async fn post_replies<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(slug): Path<String>,
    caller: Caller,
    request_id: Option<Extension<RequestId>>,
    query: Result<Query<ReplyPageQuery>, QueryRejection>,
) -> ApiResult<Json<ReplyPage>> {
    let correlation_id = correlation(request_id);
    let fail = |e: ForumError| reject(e, correlation_id.as_deref());

    let Query(query) = query.map_err(query_error).map_err(fail)?;
    let post = state.forum.posts.find_by_slug(&slug).await.map_err(fail)?;
    let page = state
        .forum
        .replies
        .page(post.id, query.page.as_deref(), caller.viewer())
        .await
        .map_err(fail)?;
    Ok(Json(page))
}

// ============================================================================
// Reply and Reaction Handlers
// ============================================================================

async fn create_reply<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    caller: Caller,
    request_id: Option<Extension<RequestId>>,
    body: Result<Json<CreateReplyRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ReplyView>)> {
    let correlation_id = correlation(request_id);
    let fail = |e: ForumError| reject(e, correlation_id.as_deref());

    let identity = require_verified(caller.identity()).map_err(fail)?;
    let Json(request) = body.map_err(body_error).map_err(fail)?;
    let draft = request.into_draft().map_err(fail)?;
    state.forum.sync_author(identity).await.map_err(fail)?;
    let reply = state
        .forum
        .replies
        .create(identity.user_id, draft)
        .await
        .map_err(fail)?;

    record_forum_write("reply");
    Ok((StatusCode::CREATED, Json(reply)))
}

async fn toggle_reaction<S: ForumStore + 'static>(
    state: &ServiceState<S>,
    caller: Caller,
    correlation_id: Option<String>,
    target_type: ReactionTargetType,
    body: Result<Json<ToggleReactionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ToggleOutcome>)> {
    let fail = |e: ForumError| reject(e, correlation_id.as_deref());

    require_authenticated(caller.identity()).map_err(fail)?;
    let Json(request) = body.map_err(body_error).map_err(fail)?;
    let (target, kind) = parse_toggle_request(
        Some(target_type.as_str()),
        request.target_id.as_deref(),
        request.reaction_type.as_deref(),
    )
    .map_err(fail)?;

    let outcome = state
        .forum
        .reactions
        .toggle(caller.identity(), target, kind)
        .await
        .map_err(fail)?;

    record_reaction_toggle(target_type.as_str(), outcome.is_added());
    let status = if outcome.is_added() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

async fn toggle_post_reaction<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    caller: Caller,
    request_id: Option<Extension<RequestId>>,
    body: Result<Json<ToggleReactionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ToggleOutcome>)> {
    toggle_reaction(&state, caller, correlation(request_id), ReactionTargetType::Post, body).await
}

async fn toggle_reply_reaction<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    caller: Caller,
    request_id: Option<Extension<RequestId>>,
    body: Result<Json<ToggleReactionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ToggleOutcome>)> {
    toggle_reaction(&state, caller, correlation(request_id), ReactionTargetType::Reply, body).await
}

// ============================================================================
// Search Handler
// ============================================================================

async fn search<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    request_id: Option<Extension<RequestId>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Json<SearchResults>> {
    let correlation_id = correlation(request_id);
    let fail = |e: ForumError| reject(e, correlation_id.as_deref());

    let Query(params) = params.map_err(query_error).map_err(fail)?;
    let results = state.forum.search.search(&params).await.map_err(fail)?;
    Ok(Json(results))
}

// ============================================================================
// Health Handlers
// ============================================================================

async fn store_reachable<S: ForumStore + 'static>(state: &ServiceState<S>) -> bool {
    match state.forum.store().ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "store ping failed");
            false
        }
    }
}

/// Health check endpoint (detailed).
async fn health_handler<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Json<HealthResponse> {
    let db_healthy = store_reachable(&state).await;

    Json(HealthResponse {
        status: if db_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_healthy,
    })
}

/// Liveness probe endpoint. Does not check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 if the store answers, 503 otherwise.
async fn readiness_handler<S: ForumStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if store_reachable(&state).await {
        Ok(Json(ReadinessResponse {
            ready: true,
            database: true,
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                database: false,
                details: Some("Database connection failed".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the forum service.
///
/// Every route runs inside [`request_context`]. Transport layers (tracing,
/// CORS) are added by the binary.
pub fn create_router<S: ForumStore + 'static>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Categories
        .route(
            "/api/forum/categories",
            get(list_categories::<S>).post(create_category::<S>),
        )
        .route(
            "/api/forum/categories/:id/breadcrumb",
            get(category_breadcrumb::<S>),
        )
        // Posts
        .route("/api/forum/posts", get(list_posts::<S>).post(create_post::<S>))
        .route("/api/forum/posts/:slug", get(get_post::<S>))
        .route("/api/forum/posts/:slug/replies", get(post_replies::<S>))
        // Replies and reactions
        .route("/api/forum/replies", post(create_reply::<S>))
        .route("/api/forum/reactions/posts", post(toggle_post_reaction::<S>))
        .route("/api/forum/reactions/replies", post(toggle_reply_reaction::<S>))
        // Search
        .route("/api/forum/search", get(search::<S>))
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
        .layer(axum::middleware::from_fn(request_context))
        .with_state(state)
}
