use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{get_buffer, health_check, list_buffers, list_sensors, welcome};
use crate::ingest::{
    handle_sensor_websocket, handle_user_sensor_websocket, handle_validate_user_websocket,
};
use crate::state::GatewayState;

/// Build the gateway router
pub fn create_router(state: Arc<GatewayState>) -> Router {
    let cors = if state.config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse::<HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health_check))
        .route("/api/sensors", get(list_sensors))
        .route("/api/buffers", get(list_buffers))
        .route("/api/buffers/{username}/{sensor_type}", get(get_buffer))
        .route("/ws/validate_user", get(handle_validate_user_websocket))
        .route("/ws/{sensor_type}", get(handle_sensor_websocket))
        .route("/ws/{username}/{sensor_type}", get(handle_user_sensor_websocket))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::sensors::{Sample, SensorType};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> Arc<GatewayState> {
        let config = GatewayConfig {
            relay_base_url: "http://127.0.0.1:9".to_string(),
            ..GatewayConfig::default()
        };
        Arc::new(GatewayState::from_config(config).unwrap())
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::json!({}));
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = get_json(create_router(test_state()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["active_sessions"], 0);
    }

    #[tokio::test]
    async fn test_sensor_table() {
        let (status, json) = get_json(create_router(test_state()), "/api/sensors").await;
        assert_eq!(status, StatusCode::OK);
        let sensors = json.as_array().unwrap();
        assert_eq!(sensors.len(), 8);
        assert_eq!(sensors[0]["sensor_type"], "ecg");
        assert_eq!(sensors[0]["relay_endpoint"], "http://127.0.0.1:9/ws/ecg");
    }

    #[tokio::test]
    async fn test_buffer_query_is_read_only() {
        let state = test_state();
        let profile = state.registry.lookup(SensorType::Ecg).unwrap().clone();
        let lease = state.directory.attach("user1", &profile);
        lease
            .buffer()
            .lock()
            .append(&[Sample::Waveform(7), Sample::Waveform(8)]);

        let router = create_router(state.clone());
        let (status, json) = get_json(router.clone(), "/api/buffers/user1/ecg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"], serde_json::json!([7, 8]));

        let (_, again) = get_json(router, "/api/buffers/user1/ecg").await;
        assert_eq!(again["data"], json["data"]);
        assert_eq!(lease.buffer().lock().len(), 2);
    }

    #[tokio::test]
    async fn test_buffer_query_missing_entry() {
        let (status, json) = get_json(create_router(test_state()), "/api/buffers/nobody/spo2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "error");
        assert_eq!(json["data"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_unknown_sensor_is_not_found() {
        let (status, json) = get_json(create_router(test_state()), "/api/buffers/user1/eeg").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["status"], "error");
    }
}
