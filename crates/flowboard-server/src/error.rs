//! Relay errors and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Request body is not well-formed JSON (400).
    #[error("Invalid JSON")]
    InvalidJson,

    /// The board file could not be written (500).
    #[error("{0}")]
    Persist(#[from] std::io::Error),

    /// A frame could not be encoded (500).
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::InvalidJson => StatusCode::BAD_REQUEST,
            RelayError::Persist(_) | RelayError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
