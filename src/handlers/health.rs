use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::sensors::SensorProfile;
use crate::state::GatewayState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_sessions: usize,
    pub active_users: usize,
    pub uptime_seconds: u64,
}

/// Root welcome endpoint
pub async fn welcome() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Welcome to the biosignal ingestion gateway" }))
}

/// Health check endpoint
pub async fn health_check(
    State(state): State<Arc<GatewayState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_sessions: state.directory.session_count(),
        active_users: state.directory.user_count(),
        uptime_seconds: state.uptime_seconds(),
    };

    (StatusCode::OK, Json(response))
}

/// Resolved sensor profile table
pub async fn list_sensors(State(state): State<Arc<GatewayState>>) -> Json<Vec<SensorProfile>> {
    Json(state.registry.profiles().into_iter().cloned().collect())
}
