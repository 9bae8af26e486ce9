//! Per-connection ingestion state machine.
//!
//! The session is transport-agnostic: the WebSocket driver feeds it
//! [`Inbound`] messages and performs the [`Outgoing`] actions it returns.
//!
//! ```text
//! Connecting -> Authenticating -> Streaming <-> Flushing -> Closed
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::directory::{BufferLease, SessionDirectory};
use super::types::{
    GatewayMessage, Outgoing, CAPACITY_REACHED_REASON, CLOSE_NORMAL, CLOSE_POLICY, POLICY_REASON,
};
use crate::relay::RelayClient;
use crate::sensors::{decode, Frame, FrameRejection, SensorProfile};

/// Lifecycle of one device connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Streaming,
    Flushing,
    Closed,
}

/// Message received from the device, independent of transport
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
    Disconnected,
}

/// Static collaborators a session needs
#[derive(Clone)]
pub struct SessionContext {
    pub directory: SessionDirectory,
    pub relay: Arc<dyn RelayClient>,
    pub allowed_users: Option<Arc<HashSet<String>>>,
}

pub struct IngestionSession {
    session_id: Uuid,
    profile: SensorProfile,
    context: SessionContext,
    state: SessionState,
    device_id: Option<String>,
    user_id: Option<String>,
    lease: Option<BufferLease>,
}

impl IngestionSession {
    pub fn new(profile: SensorProfile, context: SessionContext) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            profile,
            context,
            state: SessionState::Connecting,
            device_id: None,
            user_id: None,
            lease: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Connection accepted; start waiting for identifiers
    pub fn open(&mut self) {
        if self.state == SessionState::Connecting {
            info!(
                "[{}] Session {} accepted, awaiting identifiers",
                self.profile.sensor_type, self.session_id
            );
            self.state = SessionState::Authenticating;
        }
    }

    /// Process one inbound message and return what to send back
    pub async fn handle(&mut self, inbound: Inbound) -> Vec<Outgoing> {
        if let Inbound::Disconnected = inbound {
            info!(
                "[{}] Session {} disconnected by device (user: {})",
                self.profile.sensor_type,
                self.session_id,
                self.user_id.as_deref().unwrap_or("-")
            );
            self.close();
            return Vec::new();
        }

        match self.state {
            SessionState::Connecting => {
                self.open();
                self.authenticate(inbound)
            }
            SessionState::Authenticating => self.authenticate(inbound),
            SessionState::Streaming => self.stream(inbound).await,
            // Flushing completes inside stream(); Closed ignores everything
            SessionState::Flushing | SessionState::Closed => Vec::new(),
        }
    }

    fn authenticate(&mut self, inbound: Inbound) -> Vec<Outgoing> {
        let text = match inbound {
            Inbound::Text(text) => text,
            Inbound::Binary(_) => {
                return vec![reject(&FrameRejection::ExpectedIdentifier)];
            }
            Inbound::Disconnected => return Vec::new(),
        };

        if self.device_id.is_none() {
            info!("[{}] Device ID received: {}", self.profile.sensor_type, text);
            if text.trim().is_empty() {
                return self.refuse("device identifier is empty");
            }
            self.device_id = Some(text);
            return Vec::new();
        }

        info!("[{}] User ID received: {}", self.profile.sensor_type, text);
        if let Err(reason) = self.check_user(&text) {
            return self.refuse(&reason);
        }

        let lease = self.context.directory.attach(&text, &self.profile);
        self.user_id = Some(text);
        self.lease = Some(lease);
        self.state = SessionState::Streaming;
        Vec::new()
    }

    fn check_user(&self, user_id: &str) -> Result<(), String> {
        check_user_id(user_id, self.context.allowed_users.as_deref())
    }

    fn refuse(&mut self, reason: &str) -> Vec<Outgoing> {
        warn!("[{}] Session {} refused: {}", self.profile.sensor_type, self.session_id, reason);
        self.close();
        vec![
            reject(&FrameRejection::IdentifierRejected(reason.to_string())),
            Outgoing::Close {
                code: CLOSE_POLICY,
                reason: POLICY_REASON.to_string(),
            },
        ]
    }

    async fn stream(&mut self, inbound: Inbound) -> Vec<Outgoing> {
        let sensor = self.profile.sensor_type;
        let bytes = match inbound {
            Inbound::Binary(bytes) => bytes,
            Inbound::Text(text) => {
                warn!("[{}] Unexpected text while streaming: {}", sensor, text);
                return vec![reject(&FrameRejection::UnexpectedText)];
            }
            Inbound::Disconnected => return Vec::new(),
        };

        let Some(lease) = self.lease.as_ref() else {
            return Vec::new();
        };
        let buffer = lease.buffer().clone();

        // A batch retained from a failed relay is retried before new samples
        let retained = buffer.lock().is_full();
        if retained {
            let mut out = self.flush().await;
            if !self.is_closed() {
                out.push(reject(&FrameRejection::BufferFull));
            }
            return out;
        }

        let samples = match Frame::parse(&bytes, &self.profile).and_then(|frame| decode(sensor, &frame)) {
            Ok(samples) => samples,
            Err(rejection) => {
                warn!("[{}] Frame rejected: {}", sensor, rejection);
                return vec![reject(&rejection)];
            }
        };

        let (appended, full) = {
            let mut guard = buffer.lock();
            let outcome = guard.append(&samples);
            if outcome.dropped > 0 {
                warn!("[{}] Buffer full, dropped {} samples", sensor, outcome.dropped);
            }
            (outcome, guard.is_full())
        };
        debug!("[{}] Stored {} samples ({} buffered)", sensor, appended.appended, appended.len);

        let mut out = vec![Outgoing::Message(GatewayMessage::Ack {
            sensor,
            appended: appended.appended,
            buffered: appended.len,
            capacity: self.profile.buffer_capacity,
        })];

        if full {
            info!("[{}] Buffer reached maximum capacity, relaying to backend", sensor);
            out.extend(self.flush().await);
        }
        out
    }

    async fn flush(&mut self) -> Vec<Outgoing> {
        let sensor = self.profile.sensor_type;
        let Some(lease) = self.lease.as_ref() else {
            return Vec::new();
        };
        let buffer = lease.buffer().clone();

        let Some(batch) = buffer.lock().begin_flush() else {
            debug!("[{}] Another session is already relaying this buffer", sensor);
            return Vec::new();
        };

        self.state = SessionState::Flushing;
        let device_id = self.device_id.clone().unwrap_or_default();
        let user_id = self.user_id.clone().unwrap_or_default();
        let outcome = self
            .context
            .relay
            .relay(&device_id, &user_id, &self.profile, &batch)
            .await;

        buffer.lock().complete_flush(batch.len(), outcome.is_success());
        let mut out = vec![Outgoing::Message(GatewayMessage::relay_status(sensor, &outcome))];

        if outcome.is_success() {
            info!("[{}] Relayed {} samples for user {}", sensor, batch.len(), user_id);
            out.push(Outgoing::Close {
                code: CLOSE_NORMAL,
                reason: CAPACITY_REACHED_REASON.to_string(),
            });
            self.close();
        } else {
            warn!(
                "[{}] Relay failed ({:?}), retaining {} samples for retry",
                sensor,
                outcome.status,
                batch.len()
            );
            self.state = SessionState::Streaming;
        }
        out
    }

    /// Enter the terminal state and release the directory entry
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        if let Some(lease) = self.lease.take() {
            info!(
                "[{}] Released buffer for user {}",
                lease.sensor(),
                lease.user_id()
            );
        }
    }
}

/// Username plausibility check shared by sessions and `/ws/validate_user`.
///
/// Empty names are refused; with an allow-list only listed names pass.
pub fn check_user_id(user_id: &str, allowed: Option<&HashSet<String>>) -> Result<(), String> {
    if user_id.trim().is_empty() {
        return Err("user identifier is empty".to_string());
    }
    if let Some(allowed) = allowed {
        if !allowed.contains(user_id) {
            return Err(format!("unknown user {}", user_id));
        }
    }
    Ok(())
}

fn reject(rejection: &FrameRejection) -> Outgoing {
    Outgoing::Message(GatewayMessage::rejected(rejection))
}
