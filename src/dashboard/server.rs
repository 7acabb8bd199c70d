//! Dashboard HTTP Server
//!
//! Axum-based server with the embedded single-page UI, CORS, and graceful shutdown.

use crate::dashboard::api::{api_router, ApiState};
use crate::dashboard::auth::AuthState;
use crate::dashboard::config::DashboardConfig;
use crate::store::Store;
use axum::{
    body::Body,
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use rust_embed::Embed;
use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Embedded static files for the dashboard
#[derive(Embed)]
#[folder = "src/dashboard/static/"]
struct StaticAssets;

/// Dashboard server
pub struct DashboardServer {
    config: DashboardConfig,
    state: ApiState,
}

impl DashboardServer {
    /// Create a new dashboard server over a store and auth state
    pub fn new(config: DashboardConfig, store: Arc<Store>, auth: Arc<AuthState>) -> Self {
        Self {
            config,
            state: ApiState::new(store, auth),
        }
    }

    /// Build the router with all routes and middleware
    pub fn build_router(&self) -> Router {
        let cors = if self.config.cors_enabled {
            CorsLayer::new()
                .allow_origin(
                    self.config
                        .cors_origins
                        .iter()
                        .filter_map(|o| o.parse().ok())
                        .collect::<Vec<_>>(),
                )
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_credentials(true)
        } else {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        };

        let mut router = Router::new()
            // Static file serving
            .route("/", get(index_handler))
            .route("/{*path}", get(static_handler))
            .nest("/api", api_router(self.state.clone()))
            .layer(cors);

        if self.config.log_requests {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Start the server and run until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.socket_addr();
        let router = self.build_router();

        info!("Starting dashboard server on {}", addr);

        if !self.config.is_localhost() && !self.state.auth.require_auth() {
            warn!(
                "Dashboard bound to {} with an open inventory API - set PORTNOTE_REQUIRE_AUTH=true",
                addr
            );
        }

        info!("Dashboard available at {}", self.config.base_url());

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Dashboard server shut down gracefully");
        Ok(())
    }

    /// Start the server and run until Ctrl+C / SIGTERM
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Get the configuration
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }
}

/// Serve the index.html file
async fn index_handler() -> impl IntoResponse {
    match StaticAssets::get("index.html") {
        Some(content) => Html(content.data.into_owned()).into_response(),
        None => Html(FALLBACK_INDEX).into_response(),
    }
}

/// Serve static files from embedded assets
async fn static_handler(axum::extract::Path(path): axum::extract::Path<String>) -> Response {
    let path = path.trim_start_matches('/');

    // Security: prevent path traversal
    if path.contains("..") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    match StaticAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream().to_string();

            (
                [
                    (header::CONTENT_TYPE, mime),
                    (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
                ],
                Body::from(content.data.into_owned()),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

/// Fallback index page when no static files are embedded
const FALLBACK_INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>PortNote</title></head>
<body>
    <h1>PortNote</h1>
    <p>The dashboard UI is not installed. The API is available under <code>/api</code>.</p>
</body>
</html>"#;
