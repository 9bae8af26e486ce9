use serde::{Deserialize, Serialize};

use crate::relay::{RelayOutcome, RelayStatus};
use crate::sensors::{FrameRejection, SensorType};

/// Close code for a normal post-flush closure
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code when the identifiers fail the plausibility check
pub const CLOSE_POLICY: u16 = 1008;

pub const CAPACITY_REACHED_REASON: &str = "Queue reached maximum capacity.";
pub const POLICY_REASON: &str = "Policy violation";

/// Messages sent from the gateway to a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// Frame decoded and stored
    Ack {
        sensor: SensorType,
        appended: usize,
        buffered: usize,
        capacity: usize,
    },

    /// Message refused; the session continues unless followed by a close
    Rejected { code: String, reason: String },

    /// Outcome of relaying a full buffer to the backend
    RelayStatus {
        status: RelayStatus,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        server_response: Option<String>,
    },
}

impl GatewayMessage {
    pub fn rejected(rejection: &FrameRejection) -> Self {
        GatewayMessage::Rejected {
            code: rejection.code().to_string(),
            reason: rejection.to_string(),
        }
    }

    pub fn relay_status(sensor: SensorType, outcome: &RelayOutcome) -> Self {
        let label = sensor.as_str().to_ascii_uppercase();
        let message = match outcome.status {
            RelayStatus::Success => format!("{} data relayed", label),
            RelayStatus::Failure => format!("{} data relay failed", label),
            RelayStatus::TransportError => format!("{} backend unreachable", label),
        };

        GatewayMessage::RelayStatus {
            status: outcome.status,
            message,
            error_code: match outcome.status {
                RelayStatus::Success => None,
                _ => outcome.backend_status_code,
            },
            server_response: outcome.backend_body.clone(),
        }
    }
}

/// Action the transport must perform for the session
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Message(GatewayMessage),
    Close { code: u16, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_wire_shape() {
        let msg = GatewayMessage::rejected(&FrameRejection::InvalidStartMarker(0));
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "rejected",
                "code": "invalid_start_marker",
                "reason": "invalid start marker",
            })
        );
    }

    #[test]
    fn test_ack_wire_shape() {
        let msg = GatewayMessage::Ack {
            sensor: SensorType::Ecg,
            appended: 20,
            buffered: 40,
            capacity: 15_000,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"ack","sensor":"ecg","appended":20,"buffered":40,"capacity":15000}"#
        );
    }

    #[test]
    fn test_relay_status_failure_carries_backend_response() {
        let outcome = RelayOutcome {
            status: RelayStatus::Failure,
            backend_status_code: Some(422),
            backend_body: Some("invalid userid".to_string()),
        };
        let msg = GatewayMessage::relay_status(SensorType::BloodPressure, &outcome);

        match msg {
            GatewayMessage::RelayStatus { status, message, error_code, server_response } => {
                assert_eq!(status, RelayStatus::Failure);
                assert_eq!(message, "NIBP data relay failed");
                assert_eq!(error_code, Some(422));
                assert_eq!(server_response.as_deref(), Some("invalid userid"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
