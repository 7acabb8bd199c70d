//! Health Check API
//!
//! Provides health check endpoints for monitoring and load balancers.

use super::ApiState;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use tracing::warn;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status
    pub status: &'static str,
    /// Application version
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime_secs: u64,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

/// Health check handler
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.version,
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Liveness probe (minimal response)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe
///
/// Returns 503 while the database does not answer.
pub async fn readiness(State(state): State<ApiState>) -> StatusCode {
    match state.store.ping() {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Create health check router
pub fn health_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::auth::{AuthConfig, AuthState};
    use crate::store::Store;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> ApiState {
        ApiState::new(
            Arc::new(Store::open_in_memory().unwrap()),
            Arc::new(AuthState::new(AuthConfig::default()).unwrap()),
        )
    }

    #[test]
    fn test_state_version() {
        assert!(!state().version.is_empty());
        assert!(state().uptime_secs() < 10);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = health_router(state())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn test_readiness_endpoint() {
        let response = health_router(state())
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
