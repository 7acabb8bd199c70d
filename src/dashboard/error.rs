//! API error taxonomy
//!
//! Every failure leaves the server as `{ "error": "<message>" }` with the
//! status code of its kind.

use crate::dashboard::auth::AuthError;
use crate::store::StoreError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Errors surfaced by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Required configuration is missing
    #[error("{0}")]
    Config(String),

    #[error("Wrong credentials")]
    Auth,

    #[error("Invalid token")]
    InvalidToken,

    /// Bad discriminator or payload shape
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Config(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Auth => StatusCode::UNAUTHORIZED,
            ApiError::InvalidToken | ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            error!("Request failed: {}", message);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), message);
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Config(msg) => ApiError::Config(msg),
            AuthError::InvalidCredentials => ApiError::Auth,
            AuthError::InvalidToken => ApiError::InvalidToken,
            AuthError::PasswordHash(msg) => ApiError::Config(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}
