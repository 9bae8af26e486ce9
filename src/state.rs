use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::ingest::{SessionContext, SessionDirectory};
use crate::relay::{HttpRelayClient, RelayClient};
use crate::sensors::SensorRegistry;

/// Main gateway state shared across all handlers
pub struct GatewayState {
    pub config: GatewayConfig,
    pub registry: SensorRegistry,
    pub directory: SessionDirectory,
    pub relay: Arc<dyn RelayClient>,
    allowed_users: Option<Arc<HashSet<String>>>,
    pub start_time: Instant,
}

impl GatewayState {
    /// State relaying over HTTP as configured
    pub fn from_config(config: GatewayConfig) -> GatewayResult<Self> {
        let relay = Arc::new(HttpRelayClient::new(config.relay_timeout)?);
        Ok(Self::with_relay(config, relay))
    }

    /// State with a caller-supplied relay client
    pub fn with_relay(config: GatewayConfig, relay: Arc<dyn RelayClient>) -> Self {
        let registry = SensorRegistry::from_config(&config);
        let allowed_users = config.allowed_users.clone().map(Arc::new);

        Self {
            config,
            registry,
            directory: SessionDirectory::new(),
            relay,
            allowed_users,
            start_time: Instant::now(),
        }
    }

    /// Collaborators handed to each new ingestion session
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            directory: self.directory.clone(),
            relay: self.relay.clone(),
            allowed_users: self.allowed_users.clone(),
        }
    }

    /// Configured username allow-list, if any
    pub fn allowed_users(&self) -> Option<&HashSet<String>> {
        self.allowed_users.as_deref()
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
