//! Application state and configuration.

use std::sync::Arc;

use skylight_core::{AppView, Embedder, HttpEmbedder, Store, DEFAULT_APPVIEW_URL};

use crate::registry::FeedRegistry;

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// Postgres connection URL.
    pub database_url: String,

    /// Embedding service base URL.
    pub embedder_url: String,

    /// AppView base URL for author feeds and full-post hydration.
    pub appview_url: String,

    /// Public hostname this generator is served from.
    pub hostname: String,

    /// The generator's service DID.
    pub service_did: String,

    /// API key guarding feed management.
    pub api_key: String,

    /// Metrics HTTP server port (0 disables the exporter).
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `DATABASE_URL`: Postgres connection URL
    /// - `EMBEDDER_URL`: embedding service base URL
    /// - `SKYLIGHT_API_KEY`: API key for feed management
    ///
    /// Optional environment variables:
    /// - `SKYLIGHT_BIND_ADDR`: bind address (default: "0.0.0.0:8080")
    /// - `SKYLIGHT_APPVIEW_URL`: AppView base URL (default: public AppView)
    /// - `SKYLIGHT_HOSTNAME`: public hostname (default: "localhost")
    /// - `SKYLIGHT_SERVICE_DID`: service DID (default: "did:web:<hostname>")
    /// - `SKYLIGHT_METRICS_PORT`: metrics port (default: 0, disabled)
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("SKYLIGHT_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let embedder_url = std::env::var("EMBEDDER_URL")
            .map_err(|_| anyhow::anyhow!("EMBEDDER_URL environment variable is required"))?;

        let appview_url = std::env::var("SKYLIGHT_APPVIEW_URL")
            .unwrap_or_else(|_| DEFAULT_APPVIEW_URL.to_string());

        let hostname =
            std::env::var("SKYLIGHT_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());

        let service_did = std::env::var("SKYLIGHT_SERVICE_DID")
            .unwrap_or_else(|_| format!("did:web:{hostname}"));

        let api_key = std::env::var("SKYLIGHT_API_KEY")
            .map_err(|_| anyhow::anyhow!("SKYLIGHT_API_KEY environment variable is required"))?;

        if api_key.trim().is_empty() {
            anyhow::bail!("SKYLIGHT_API_KEY must not be empty");
        }

        let metrics_port = std::env::var("SKYLIGHT_METRICS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        tracing::info!(
            bind_addr = %bind_addr,
            appview_url = %appview_url,
            hostname = %hostname,
            service_did = %service_did,
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            database_url,
            embedder_url,
            appview_url,
            hostname,
            service_did,
            api_key,
            metrics_port,
        })
    }
}

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Content store handle.
    pub store: Store,

    /// Embedding oracle client.
    pub embedder: Arc<dyn Embedder>,

    /// AppView client for candidate and full-post fetches.
    pub appview: AppView,

    /// Registered feed handles.
    pub registry: Arc<FeedRegistry>,

    /// Application configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new application state from configuration and a connected
    /// store.
    pub fn new(config: Config, store: Store) -> Self {
        let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(&config.embedder_url));
        let appview = AppView::new(&config.appview_url);

        Self {
            store,
            embedder,
            appview,
            registry: Arc::new(FeedRegistry::new()),
            config: Arc::new(config),
        }
    }
}
