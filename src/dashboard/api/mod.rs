//! Dashboard API Endpoints
//!
//! REST API for the inventory, login and health probes.

pub mod health;
pub mod search;
pub mod servers;

use crate::dashboard::auth::{auth_middleware, auth_router, AuthState};
use crate::store::Store;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Instant;

pub use health::health_router;

/// Shared state for every API handler
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<Store>,
    pub auth: Arc<AuthState>,
    /// Server start time for uptime calculation
    pub start_time: Instant,
    /// Application version
    pub version: &'static str,
}

impl ApiState {
    pub fn new(store: Arc<Store>, auth: Arc<AuthState>) -> Self {
        Self {
            store,
            auth,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Create the full API router with all endpoints
///
/// Routes:
/// - POST /auth/login, /auth/validate, /auth/logout
/// - GET /get - Servers with their ports
/// - POST /add - Add a server or port
/// - PUT /update - Update a server or port
/// - DELETE /delete - Delete a host, VM or port
/// - POST /scan - Queue a scan request
/// - GET /search?q= - Fuzzy search over servers and ports
/// - GET /health, /healthz, /readyz - Probes
pub fn api_router(state: ApiState) -> Router {
    let inventory = Router::new()
        .route("/get", get(servers::list_handler))
        .route("/add", post(servers::add_handler))
        .route("/update", put(servers::update_handler))
        .route("/delete", delete(servers::delete_handler))
        .route("/scan", post(servers::scan_handler))
        .route("/search", get(search::search_handler))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    Router::new()
        .nest("/auth", auth_router(state.auth.clone()))
        .merge(inventory)
        .merge(health_router(state))
}
