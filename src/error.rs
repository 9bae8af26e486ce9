use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::ConfigError;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur in the gateway
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Unknown sensor type: {0}")]
    UnknownSensorType(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Nothing to relay for sensor {0}")]
    EmptyBatch(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match self {
            GatewayError::UnknownSensorType(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidIdentifier(_) | GatewayError::EmptyBatch(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
