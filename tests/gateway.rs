use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use biosignal_gateway::{
    create_router, GatewayConfig, GatewayState, RelayClient, RelayOutcome, RelayStatus, Sample,
    SensorProfile,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_test::assert_ok;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::frame::coding::CloseCode, tungstenite::Message,
    MaybeTlsStream, WebSocketStream,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Relay double recording every batch it is handed
#[derive(Default)]
struct RecordingRelay {
    batches: Mutex<Vec<(String, Vec<Sample>)>>,
}

#[async_trait]
impl RelayClient for RecordingRelay {
    async fn relay(
        &self,
        _device_id: &str,
        user_id: &str,
        _profile: &SensorProfile,
        samples: &[Sample],
    ) -> RelayOutcome {
        self.batches.lock().push((user_id.to_string(), samples.to_vec()));
        RelayOutcome {
            status: RelayStatus::Success,
            backend_status_code: Some(200),
            backend_body: None,
        }
    }
}

async fn spawn_gateway(state: GatewayState) -> SocketAddr {
    let app = create_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, path: &str, device_id: &str, user_id: &str) -> Client {
    let (mut ws, _) = assert_ok!(connect_async(format!("ws://{}{}", addr, path)).await);
    ws.send(Message::Text(device_id.into())).await.unwrap();
    ws.send(Message::Text(user_id.into())).await.unwrap();
    ws
}

async fn next_message(ws: &mut Client) -> Message {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for gateway")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

async fn next_json(ws: &mut Client) -> serde_json::Value {
    match next_message(ws).await {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected text message, got {:?}", other),
    }
}

fn waveform_frame(command: u8, value: u8) -> Vec<u8> {
    let mut bytes = vec![0u8; 86];
    bytes[0] = 0xF7;
    bytes[1] = command;
    bytes[2] = 0x50;
    for chunk in bytes[3..83].chunks_exact_mut(4) {
        chunk[0] = value;
    }
    bytes[85] = 0xFA;
    bytes
}

fn blood_pressure_frame(systolic: u8, diastolic: u8) -> Vec<u8> {
    vec![0xF7, 0x42, 0x04, 0x00, diastolic, systolic, 0x00, 0x00, 0x00, 0xFA]
}

async fn health(addr: SocketAddr) -> serde_json::Value {
    reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_ecg_frames_are_acked_and_queryable() {
    let relay = Arc::new(RecordingRelay::default());
    let addr = spawn_gateway(GatewayState::with_relay(GatewayConfig::default(), relay.clone())).await;
    let mut ws = connect(addr, "/ws/ecg", "device-1", "user1").await;

    for _ in 0..3 {
        ws.send(Message::Binary(waveform_frame(0x12, 5).into())).await.unwrap();
        let ack = next_json(&mut ws).await;
        assert_eq!(ack["type"], "ack");
        assert_eq!(ack["appended"], 20);
    }

    let body: serde_json::Value = reqwest::get(format!("http://{}/api/buffers/user1/ecg", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "success");
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 60);
    assert!(data.iter().all(|v| v == 5));
    assert!(relay.batches.lock().is_empty());
}

#[tokio::test]
async fn test_blood_pressure_relays_and_closes() {
    let received: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));

    async fn accept(
        State(received): State<Arc<Mutex<Vec<serde_json::Value>>>>,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        received.lock().push(body);
        StatusCode::OK
    }

    let backend = Router::new()
        .route("/ws/nibp", post(accept))
        .with_state(received.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, backend).await.unwrap();
    });

    let config = GatewayConfig {
        relay_base_url: format!("http://{}", backend_addr),
        ..GatewayConfig::default()
    };
    let addr = spawn_gateway(GatewayState::from_config(config).unwrap()).await;
    let mut ws = connect(addr, "/ws/nibp", "cuff-3", "user2").await;

    ws.send(Message::Binary(blood_pressure_frame(120, 80).into())).await.unwrap();

    let ack = next_json(&mut ws).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["buffered"], 1);

    let status = next_json(&mut ws).await;
    assert_eq!(status["type"], "relay_status");
    assert_eq!(status["status"], "success");

    match next_message(&mut ws).await {
        Message::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Normal);
            assert_eq!(frame.reason.as_str(), "Queue reached maximum capacity.");
        }
        other => panic!("expected close frame, got {:?}", other),
    }

    assert_eq!(
        received.lock().as_slice(),
        &[serde_json::json!({
            "device_id": "cuff-3",
            "userid": "user2",
            "systolic": 120,
            "diastolic": 80,
        })]
    );
}

#[tokio::test]
async fn test_bad_start_marker_keeps_session_open() {
    let relay = Arc::new(RecordingRelay::default());
    let addr = spawn_gateway(GatewayState::with_relay(GatewayConfig::default(), relay)).await;
    let mut ws = connect(addr, "/ws/emg", "device-1", "user1").await;

    let mut frame = waveform_frame(0x22, 1);
    frame[0] = 0x00;
    ws.send(Message::Binary(frame.into())).await.unwrap();

    let rejected = next_json(&mut ws).await;
    assert_eq!(rejected["type"], "rejected");
    assert_eq!(rejected["code"], "invalid_start_marker");
    assert_eq!(rejected["reason"], "invalid start marker");

    ws.send(Message::Binary(waveform_frame(0x22, 1).into())).await.unwrap();
    let ack = next_json(&mut ws).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["buffered"], 20);
}

#[tokio::test]
async fn test_unknown_sensor_route_is_refused() {
    let relay = Arc::new(RecordingRelay::default());
    let addr = spawn_gateway(GatewayState::with_relay(GatewayConfig::default(), relay)).await;

    let result = connect_async(format!("ws://{}/ws/eeg", addr)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_user_scoped_route_streams() {
    let relay = Arc::new(RecordingRelay::default());
    let addr = spawn_gateway(GatewayState::with_relay(GatewayConfig::default(), relay)).await;
    let mut ws = connect(addr, "/ws/user1/spo2", "oximeter", "user1").await;

    ws.send(Message::Binary(
        vec![0xF7, 0x52, 0x04, 0x00, 0x00, 97, 0x00, 0x00, 0x00, 0xFA].into(),
    ))
    .await
    .unwrap();
    let ack = next_json(&mut ws).await;
    assert_eq!(ack["sensor"], "spo2");
    assert_eq!(ack["capacity"], 10);
}

#[tokio::test]
async fn test_disconnect_releases_only_that_user() {
    let relay = Arc::new(RecordingRelay::default());
    let addr = spawn_gateway(GatewayState::with_relay(GatewayConfig::default(), relay)).await;

    let mut first = connect(addr, "/ws/ecg", "device-1", "user1").await;
    let mut second = connect(addr, "/ws/ecg", "device-2", "user2").await;
    for ws in [&mut first, &mut second] {
        ws.send(Message::Binary(waveform_frame(0x12, 2).into())).await.unwrap();
        next_json(ws).await;
    }
    assert_eq!(health(addr).await["active_users"], 2);

    first.close(None).await.unwrap();
    drop(first);

    let mut remaining = 2;
    for _ in 0..50 {
        remaining = health(addr).await["active_users"].as_u64().unwrap();
        if remaining == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, 1);

    let body: serde_json::Value = reqwest::get(format!("http://{}/api/buffers/user2/ecg", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn test_validate_user_answers_each_name() {
    let config = GatewayConfig {
        allowed_users: Some(["user1".to_string(), "user2".to_string()].into_iter().collect()),
        ..GatewayConfig::default()
    };
    let relay = Arc::new(RecordingRelay::default());
    let addr = spawn_gateway(GatewayState::with_relay(config, relay)).await;
    let (mut ws, _) = assert_ok!(connect_async(format!("ws://{}/ws/validate_user", addr)).await);

    for (name, expected) in [("user1", "valid"), ("mallory", "invalid"), ("", "invalid"), ("user2", "valid")] {
        ws.send(Message::Text(name.into())).await.unwrap();
        match next_message(&mut ws).await {
            Message::Text(reply) => assert_eq!(reply.as_str(), expected, "name {:?}", name),
            other => panic!("expected text reply, got {:?}", other),
        }
    }

    // Validation never creates buffers
    assert_eq!(health(addr).await["active_users"], 0);
}
