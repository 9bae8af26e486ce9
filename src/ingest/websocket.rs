use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::session::{check_user_id, Inbound, IngestionSession};
use super::types::Outgoing;
use crate::error::GatewayResult;
use crate::sensors::SensorProfile;
use crate::state::GatewayState;

/// Upgrade `/ws/{sensor_type}` to an ingestion session
pub async fn handle_sensor_websocket(
    ws: WebSocketUpgrade,
    Path(sensor_type): Path<String>,
    State(state): State<Arc<GatewayState>>,
) -> GatewayResult<Response> {
    let profile = state.registry.resolve(&sensor_type)?.clone();
    Ok(upgrade(ws, profile, state, None))
}

/// Upgrade `/ws/{username}/{sensor_type}` to an ingestion session
pub async fn handle_user_sensor_websocket(
    ws: WebSocketUpgrade,
    Path((username, sensor_type)): Path<(String, String)>,
    State(state): State<Arc<GatewayState>>,
) -> GatewayResult<Response> {
    let profile = state.registry.resolve(&sensor_type)?.clone();
    Ok(upgrade(ws, profile, state, Some(username)))
}

/// Upgrade `/ws/validate_user`: answers each text username with `valid` or `invalid`
pub async fn handle_validate_user_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    ws.on_upgrade(move |socket| validate_users(socket, state))
}

async fn validate_users(mut socket: WebSocket, state: Arc<GatewayState>) {
    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                error!("[validate_user] WebSocket error: {}", e);
                break;
            }
        };

        let reply = match msg {
            Message::Text(name) => match check_user_id(name.as_str(), state.allowed_users()) {
                Ok(()) => {
                    info!("[validate_user] User {} is valid", name.as_str());
                    Message::Text("valid".into())
                }
                Err(reason) => {
                    warn!("[validate_user] User rejected: {}", reason);
                    Message::Text("invalid".into())
                }
            },
            Message::Ping(data) => Message::Pong(data),
            Message::Close(_) => break,
            Message::Binary(_) | Message::Pong(_) => continue,
        };

        if let Err(e) = socket.send(reply).await {
            warn!("[validate_user] Failed to send reply: {}", e);
            break;
        }
    }

    info!("[validate_user] Connection terminated");
}

fn upgrade(
    ws: WebSocketUpgrade,
    profile: SensorProfile,
    state: Arc<GatewayState>,
    route_user: Option<String>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, profile, state, route_user))
        .into_response()
}

/// Pump one WebSocket connection through an ingestion session
async fn handle_socket(
    socket: WebSocket,
    profile: SensorProfile,
    state: Arc<GatewayState>,
    route_user: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();
    let sensor = profile.sensor_type;
    let mut session = IngestionSession::new(profile, state.session_context());
    session.open();

    info!(
        "[{}] WebSocket connection accepted (route user: {})",
        sensor,
        route_user.as_deref().unwrap_or("-")
    );

    let mut route_checked = route_user.is_none();

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                error!("[{}] WebSocket error: {}", sensor, e);
                break;
            }
        };

        let inbound = match msg {
            Message::Text(text) => Inbound::Text(text.to_string()),
            Message::Binary(data) => Inbound::Binary(data.to_vec()),
            Message::Close(_) => Inbound::Disconnected,
            Message::Ping(data) => {
                if let Err(e) = sender.send(Message::Pong(data)).await {
                    error!("[{}] Failed to send pong: {}", sensor, e);
                    break;
                }
                continue;
            }
            Message::Pong(_) => continue,
        };

        for action in session.handle(inbound).await {
            let result = match action {
                Outgoing::Message(msg) => match serde_json::to_string(&msg) {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("[{}] Failed to serialize response: {}", sensor, e);
                        continue;
                    }
                },
                Outgoing::Close { code, reason } => {
                    sender
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await
                }
            };

            if let Err(e) = result {
                warn!("[{}] Failed to send to device: {}", sensor, e);
                session.close();
                break;
            }
        }

        if !route_checked {
            if let (Some(route_user), Some(user_id)) = (route_user.as_deref(), session.user_id()) {
                if route_user != user_id {
                    warn!(
                        "[{}] Route user {} differs from identified user {}, buffering under {}",
                        sensor, route_user, user_id, user_id
                    );
                }
                route_checked = true;
            }
        }

        if session.is_closed() {
            break;
        }
    }

    // Covers transport errors and streams that end without a close frame
    session.close();
    info!("[{}] WebSocket connection terminated", sensor);
}
