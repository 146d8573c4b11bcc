//! Forum Service Binary
//!
//! Runs the property forum as a REST API service:
//! - Structured JSON logging
//! - Request tracing with correlation IDs
//! - Graceful shutdown handling
//! - Health check endpoints
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string
//! - `DB_MAX_CONNECTIONS`, `DB_MIN_CONNECTIONS`, `DB_CONNECT_TIMEOUT_SECS`,
//!   `DB_IDLE_TIMEOUT_SECS`, `DB_MAX_LIFETIME_SECS`: pool tuning
//! - `FORUM_IDENTITY_SECRET`: shared secret with the identity gateway (required in production)
//! - `FORUM_AUTO_MIGRATE`: apply the schema on startup when `true`
//! - `PORT`: Service port (default: 8002)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... FORUM_IDENTITY_SECRET=... cargo run --bin forum_service --features service
//! ```

use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use property_forum::service::{create_router, ServiceConfig, ServiceState};
use property_forum::{PostgresConfig, PostgresForumStore};

const DEFAULT_LOG_FILTER: &str = "forum_service=info,property_forum=info,tower_http=info,sqlx=warn";

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing(pretty: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    if pretty {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::from_env();
    init_tracing(config.pretty_logs);

    let version = env!("CARGO_PKG_VERSION");
    let build_sha = option_env!("BUILD_SHA").unwrap_or("dev");
    info!(version = version, build_sha = build_sha, "Starting forum service");

    let identity_secret = config.identity_secret_or_default();

    info!("Connecting to PostgreSQL...");
    let connect_start = Instant::now();
    let store = match tokio::time::timeout(
        Duration::from_secs(30),
        PostgresForumStore::new(PostgresConfig::from_env()),
    )
    .await
    {
        Ok(Ok(store)) => store,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            return Err(e.into());
        }
        Err(_) => {
            tracing::error!("PostgreSQL connection timeout after 30s");
            return Err("Database connection timeout".into());
        }
    };

    let pool = store.pool_stats();
    info!(
        latency_ms = connect_start.elapsed().as_millis() as u64,
        pool_size = pool.size,
        pool_idle = pool.idle,
        pool_max = pool.max,
        "PostgreSQL connection established"
    );

    if config.auto_migrate {
        store.migrate().await?;
        info!("Forum schema applied");
    }

    let state = ServiceState::new(store, identity_secret);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = config.bind_addr()?;
    info!(address = %addr, version = version, "Forum service listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Forum service shutdown complete");
    Ok(())
}
