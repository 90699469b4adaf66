//! HTTP server components for metabee
//!
//! This module provides the HTTP server infrastructure including:
//! - Router configuration and route handlers
//! - Authentication and logging middleware
//! - Cross-origin policy
//! - Server lifecycle management

pub mod middleware;
pub mod router;

pub use middleware::{auth_middleware, logging_middleware, AuthResponse, AuthenticatedAccount};
pub use router::{build_router, ApiError, AppState, HealthResponse, ValidateResponse};

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{header, request::Parts, HeaderValue, Method};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::{CorsConfig, ServerConfig};
use crate::database::AccountStore;

/// HTTP Server for metabee
///
/// Manages the axum server lifecycle, including:
/// - Binding to configured address
/// - Applying middleware layers
/// - Graceful shutdown handling
pub struct Server<S: AccountStore + 'static> {
    config: ServerConfig,
    cors: CorsConfig,
    state: AppState<S>,
}

impl<S: AccountStore + 'static> Server<S> {
    /// Create a new server instance
    pub fn new(config: ServerConfig, state: AppState<S>) -> Self {
        Self {
            config,
            cors: CorsConfig::default(),
            state,
        }
    }

    /// Use a specific cross-origin policy
    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.config.host.parse().unwrap_or([0, 0, 0, 0].into()),
            self.config.port,
        )
    }

    /// Run the server until shutdown signal is received
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Future that resolves when the server should shut down
    ///
    /// # Returns
    ///
    /// Ok(()) if server shuts down gracefully, Err if there was an error
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.bind_addr();
        let app = build_router(self.state);

        // Apply middleware layers
        let app = app
            .layer(axum::middleware::from_fn(logging_middleware))
            .layer(cors_layer(&self.cors))
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .layer(tower_http::compression::CompressionLayer::new());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Build the CORS layer for the configured origin policy
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let policy = config.clone();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|origin| origin_allowed(&policy, origin))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(config.max_age_secs))
}

/// Decide whether a browser origin may call the API
pub fn origin_allowed(config: &CorsConfig, origin: &str) -> bool {
    if config.allowed_origins.iter().any(|o| o == origin) {
        return true;
    }

    if config.allow_file_origin && (origin == "null" || origin.starts_with("file://")) {
        return true;
    }

    if config.allow_localhost {
        let rest = origin
            .strip_prefix("http://")
            .or_else(|| origin.strip_prefix("https://"));
        if let Some(rest) = rest {
            let host = rest.split(':').next().unwrap_or(rest);
            return host == "localhost" || host == "127.0.0.1";
        }
    }

    false
}

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    /// Failed to serve requests
    #[error("Server error: {0}")]
    Serve(String),
}
