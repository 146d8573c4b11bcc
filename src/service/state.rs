//! Service configuration and shared state.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::forum::Forum;
use crate::store::ForumStore;

/// Secret used when `FORUM_IDENTITY_SECRET` is unset.
const DEVELOPMENT_IDENTITY_SECRET: &[u8] = b"development_only_identity_secret_not_for_production";

/// Process configuration, read once at startup.
///
/// - `HOST` (default `0.0.0.0`)
/// - `PORT` (default `8002`)
/// - `LOG_FORMAT`: `json` (default) or `pretty`
/// - `FORUM_IDENTITY_SECRET`: shared secret with the identity gateway
/// - `FORUM_AUTO_MIGRATE`: apply the schema at startup when `true`
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Emit human-readable logs instead of JSON.
    pub pretty_logs: bool,
    /// `None` when the variable is unset.
    pub identity_secret: Option<Vec<u8>>,
    /// Apply the schema before serving.
    pub auto_migrate: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8002,
            pretty_logs: false,
            identity_secret: None,
            auto_migrate: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Unparseable values
    /// fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str| {
            lookup(key)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false)
        };
        Self {
            host: lookup("HOST")
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            pretty_logs: lookup("LOG_FORMAT")
                .map(|f| f.trim().eq_ignore_ascii_case("pretty"))
                .unwrap_or(false),
            identity_secret: lookup("FORUM_IDENTITY_SECRET")
                .filter(|s| !s.is_empty())
                .map(String::into_bytes),
            auto_migrate: flag("FORUM_AUTO_MIGRATE"),
        }
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// The configured identity secret, or the development fallback with a
    /// warning.
    pub fn identity_secret_or_default(&self) -> Vec<u8> {
        match &self.identity_secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::warn!(
                    "FORUM_IDENTITY_SECRET not set, using development secret. \
                     Set this for production!"
                );
                DEVELOPMENT_IDENTITY_SECRET.to_vec()
            }
        }
    }
}

/// Shared service state.
pub struct ServiceState<S: ForumStore + 'static> {
    /// Forum components over the configured store.
    pub forum: Arc<Forum<S>>,
    /// Shared secret for identity header signatures.
    identity_secret: Arc<Vec<u8>>,
}

impl<S: ForumStore + 'static> ServiceState<S> {
    /// Create service state over a store with the gateway's shared secret.
    pub fn new(store: S, identity_secret: Vec<u8>) -> Self {
        Self::with_shared_store(Arc::new(store), identity_secret)
    }

    /// Create service state over a store that is also used elsewhere.
    pub fn with_shared_store(store: Arc<S>, identity_secret: Vec<u8>) -> Self {
        Self {
            forum: Arc::new(Forum::new(store)),
            identity_secret: Arc::new(identity_secret),
        }
    }

    /// Create service state reading the secret from the environment.
    pub fn from_env(store: S) -> Self {
        Self::new(store, ServiceConfig::from_env().identity_secret_or_default())
    }

    pub(crate) fn identity_secret(&self) -> &[u8] {
        &self.identity_secret
    }
}

impl<S: ForumStore + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            forum: Arc::clone(&self.forum),
            identity_secret: Arc::clone(&self.identity_secret),
        }
    }
}
