//! Inventory API
//!
//! CRUD over servers and ports plus the scan queue. Every handler maps
//! straight onto one store call; the payload shape is trusted beyond what
//! deserialization enforces.
//!
//! # Endpoints
//!
//! - `GET /api/get` - All servers, each with its ports
//! - `POST /api/add` - `{type: 0|1, ...fields}`
//! - `PUT /api/update` - `{type: 0|1, id, data: {...}}`
//! - `DELETE /api/delete` - `{type: 0|1|2, id}`
//! - `POST /api/scan` - `{serverId}`

use super::ApiState;
use crate::dashboard::error::ApiError;
use crate::models::{
    DeleteKind, EntityKind, NewPort, NewServer, PortPatch, ServerPatch, ServerWithPorts,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

/// Add request: discriminator plus the fields of the new row
#[derive(Debug, Deserialize)]
pub struct AddRequest {
    #[serde(rename = "type")]
    pub kind: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Update request
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    #[serde(rename = "type")]
    pub kind: i64,
    pub id: i64,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Delete request
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(rename = "type")]
    pub kind: i64,
    pub id: i64,
}

/// Scan request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub server_id: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn fields_as<T: DeserializeOwned>(fields: Map<String, Value>) -> Result<T, ApiError> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

fn invalid_type(kind: i64) -> ApiError {
    ApiError::InvalidRequest(format!("Invalid type: {}", kind))
}

/// List every server with its ports
pub async fn list_handler(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ServerWithPorts>>, ApiError> {
    Ok(Json(state.store.servers_with_ports()?))
}

/// Add a server (`type` 0) or a port (`type` 1)
pub async fn add_handler(
    State(state): State<ApiState>,
    payload: Result<Json<AddRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;

    match EntityKind::try_from(req.kind).map_err(invalid_type)? {
        EntityKind::Server => {
            let new: NewServer = fields_as(req.fields)?;
            let server = state.store.add_server(&new)?;
            info!("Created server {} ({})", server.id, server.name);
        }
        EntityKind::Port => {
            let new: NewPort = fields_as(req.fields)?;
            let port = state.store.add_port(&new)?;
            info!("Created port {} on server {}", port.port, port.server_id);
        }
    }

    Ok(Json(MessageResponse { message: "Success" }))
}

/// Update the listed fields of a server (`type` 0) or a port (`type` 1)
pub async fn update_handler(
    State(state): State<ApiState>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(req) = payload?;

    match EntityKind::try_from(req.kind).map_err(invalid_type)? {
        EntityKind::Server => {
            let patch: ServerPatch = fields_as(req.data)?;
            state.store.update_server(req.id, &patch)?;
        }
        EntityKind::Port => {
            let patch: PortPatch = fields_as(req.data)?;
            state.store.update_port(req.id, &patch)?;
        }
    }

    Ok(Json(SuccessResponse { success: true }))
}

/// Delete a host with its VMs (`type` 0), a single VM (`type` 1) or a port (`type` 2)
pub async fn delete_handler(
    State(state): State<ApiState>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(req) = payload?;

    match DeleteKind::try_from(req.kind).map_err(invalid_type)? {
        DeleteKind::Host => {
            state.store.delete_host(req.id)?;
        }
        DeleteKind::Vm => {
            state.store.delete_vm(req.id)?;
        }
        DeleteKind::Port => state.store.delete_port(req.id)?,
    }

    Ok(Json(SuccessResponse { success: true }))
}

/// Queue a scan for a server
pub async fn scan_handler(
    State(state): State<ApiState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    state.store.add_scan(req.server_id)?;
    Ok(Json(MessageResponse { message: "Success" }))
}
