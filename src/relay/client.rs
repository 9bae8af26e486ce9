use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::payload::build_payload;
use crate::error::GatewayResult;
use crate::sensors::{Sample, SensorProfile};

/// How a relay attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    /// Backend answered 200
    Success,
    /// Backend answered with any other status, or the batch could not be sent
    Failure,
    /// Backend unreachable or timed out
    TransportError,
}

/// Structured result returned to the ingestion session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayOutcome {
    pub status: RelayStatus,
    pub backend_status_code: Option<u16>,
    pub backend_body: Option<String>,
}

impl RelayOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RelayStatus::Success
    }

    fn failure(code: Option<u16>, body: Option<String>) -> Self {
        Self {
            status: RelayStatus::Failure,
            backend_status_code: code,
            backend_body: body,
        }
    }
}

/// Forwards a full buffer to the downstream backend
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Perform a single relay attempt; never retries
    async fn relay(
        &self,
        device_id: &str,
        user_id: &str,
        profile: &SensorProfile,
        samples: &[Sample],
    ) -> RelayOutcome;
}

/// Relay client posting JSON over HTTP
#[derive(Clone)]
pub struct HttpRelayClient {
    client: reqwest::Client,
}

impl HttpRelayClient {
    /// Create a client whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn relay(
        &self,
        device_id: &str,
        user_id: &str,
        profile: &SensorProfile,
        samples: &[Sample],
    ) -> RelayOutcome {
        let sensor = profile.sensor_type;
        let payload = match build_payload(device_id, user_id, sensor, samples) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[{}] Not relaying batch: {}", sensor, e);
                return RelayOutcome::failure(None, Some(e.to_string()));
            }
        };

        debug!(
            "[{}] Relaying {} samples for user {} to {}",
            sensor,
            samples.len(),
            user_id,
            profile.relay_endpoint
        );

        let response = match self
            .client
            .post(&profile.relay_endpoint)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("[{}] Relay request failed: {}", sensor, e);
                return RelayOutcome {
                    status: RelayStatus::TransportError,
                    backend_status_code: None,
                    backend_body: Some(e.to_string()),
                };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!("[{}] Failed to read relay response: {}", sensor, e);
                return RelayOutcome {
                    status: RelayStatus::TransportError,
                    backend_status_code: Some(status.as_u16()),
                    backend_body: Some(e.to_string()),
                };
            }
        };

        if status == StatusCode::OK {
            info!("[{}] Relay accepted by backend", sensor);
            RelayOutcome {
                status: RelayStatus::Success,
                backend_status_code: Some(status.as_u16()),
                backend_body: Some(body),
            }
        } else {
            warn!("[{}] Relay rejected by backend: {} {}", sensor, status, body);
            RelayOutcome::failure(Some(status.as_u16()), Some(body))
        }
    }
}
