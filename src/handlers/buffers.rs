use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::ingest::BufferInfo;
use crate::sensors::Sample;
use crate::state::GatewayState;

/// Response of the read-only buffer query
#[derive(Debug, Serialize)]
pub struct BufferResponse {
    pub status: &'static str,
    pub message: String,
    pub data: Vec<Sample>,
}

/// Current buffer contents for (user, sensor); never mutates state
pub async fn get_buffer(
    Path((username, sensor_type)): Path<(String, String)>,
    State(state): State<Arc<GatewayState>>,
) -> GatewayResult<Json<BufferResponse>> {
    let profile = state.registry.resolve(&sensor_type)?;
    let label = profile.sensor_type.as_str().to_ascii_uppercase();

    let response = match state.directory.snapshot(&username, profile.sensor_type) {
        Some(data) => BufferResponse {
            status: "success",
            message: format!("{} buffer for {}", label, username),
            data,
        },
        None => BufferResponse {
            status: "error",
            message: format!("No {} data for {}", label, username),
            data: Vec::new(),
        },
    };

    Ok(Json(response))
}

/// Summary of every live buffer
pub async fn list_buffers(State(state): State<Arc<GatewayState>>) -> Json<Vec<BufferInfo>> {
    Json(state.directory.list())
}
