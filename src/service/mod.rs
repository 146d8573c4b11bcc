//! Forum REST service.
//!
//! ## Endpoints
//!
//! - `GET /api/forum/categories` - Active category tree with post counts
//! - `POST /api/forum/categories` - Create a category (verified caller)
//! - `GET /api/forum/categories/:id/breadcrumb` - Root-to-leaf path
//! - `GET /api/forum/posts` - Paginated post listing
//! - `POST /api/forum/posts` - Create a post (verified caller)
//! - `GET /api/forum/posts/:slug` - Post detail, counts one view
//! - `GET /api/forum/posts/:slug/replies` - Paginated replies
//! - `POST /api/forum/replies` - Create a reply (verified caller)
//! - `POST /api/forum/reactions/posts` - Toggle a reaction on a post
//! - `POST /api/forum/reactions/replies` - Toggle a reaction on a reply
//! - `GET /api/forum/search` - Search posts and categories
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//!
//! Callers are identified by signed gateway headers, see [`extract`]. A
//! forwarded display name is recorded as the author's name on posts and
//! replies.

pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;

pub use extract::{identity_from_headers, Caller};
pub use middleware::{request_context, RequestId, REQUEST_ID_HEADER};
pub use routes::{create_router, ErrorResponse};
pub use state::{ServiceConfig, ServiceState};
