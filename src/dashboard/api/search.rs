//! Search API
//!
//! `GET /api/search?q=` ranks the current inventory snapshot with the fuzzy
//! scorer and returns it in the same shape as `GET /api/get`.

use super::ApiState;
use crate::dashboard::error::ApiError;
use crate::models::ServerWithPorts;
use crate::search::search;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

pub async fn search_handler(
    State(state): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ServerWithPorts>>, ApiError> {
    let snapshot = state.store.servers_with_ports()?;
    Ok(Json(search(snapshot, &params.q)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::api::api_router;
    use crate::dashboard::auth::{AuthConfig, AuthState};
    use crate::models::{NewPort, NewServer};
    use crate::store::Store;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_search_endpoint() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let nas = store
            .add_server(&NewServer {
                name: "nas".into(),
                ip: "10.0.0.2".into(),
                host: None,
            })
            .unwrap();
        store
            .add_server(&NewServer {
                name: "router".into(),
                ip: "10.0.0.1".into(),
                host: None,
            })
            .unwrap();
        store
            .add_port(&NewPort {
                server_id: nas.id,
                note: Some("Jellyfin".into()),
                port: 8096,
            })
            .unwrap();

        let auth = Arc::new(AuthState::new(AuthConfig::default()).unwrap());
        let app = api_router(ApiState::new(store, auth));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/search?q=jelly")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let results = json.as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["name"], "nas");
        assert_eq!(results[0]["ports"][0]["port"], 8096);
    }
}
