use std::collections::{HashMap, HashSet};
use std::env;
use std::time::Duration;

use crate::sensors::SensorType;

/// Gateway configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address (0.0.0.0 for LAN, 127.0.0.1 for localhost)
    pub bind_addr: String,
    /// Base URL of the backend receiving relayed batches
    pub relay_base_url: String,
    /// Timeout for a single relay POST
    pub relay_timeout: Duration,
    /// Usernames accepted at session start; `None` accepts any non-empty name
    pub allowed_users: Option<HashSet<String>>,
    /// Per-sensor buffer capacity overrides
    pub capacity_overrides: HashMap<SensorType, usize>,
    /// CORS allowed origins (comma-separated in env var); empty allows any
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_addr: "0.0.0.0".to_string(),
            relay_base_url: "http://localhost:8080".to_string(),
            relay_timeout: Duration::from_secs(10),
            allowed_users: None,
            capacity_overrides: HashMap::new(),
            cors_origins: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("GATEWAY_PORT") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidPort)?,
            None => defaults.port,
        };

        let relay_timeout = match lookup("RELAY_TIMEOUT_SECONDS") {
            Some(value) => {
                let secs: u64 = value.trim().parse().map_err(|_| {
                    ConfigError::InvalidValue(format!("RELAY_TIMEOUT_SECONDS={}", value))
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue(
                        "RELAY_TIMEOUT_SECONDS must be at least 1".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => defaults.relay_timeout,
        };

        let allowed_users = lookup("ALLOWED_USERS").map(|s| {
            s.split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect::<HashSet<_>>()
        });

        let mut capacity_overrides = HashMap::new();
        for sensor in SensorType::ALL {
            let key = format!("BUFFER_CAPACITY_{}", sensor.as_str().to_ascii_uppercase());
            if let Some(value) = lookup(&key) {
                let capacity: usize = value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(format!("{}={}", key, value)))?;
                if capacity == 0 {
                    return Err(ConfigError::InvalidValue(format!("{} must be at least 1", key)));
                }
                capacity_overrides.insert(sensor, capacity);
            }
        }

        Ok(Self {
            port,
            bind_addr: lookup("GATEWAY_BIND_ADDR").unwrap_or(defaults.bind_addr),
            relay_base_url: lookup("RELAY_BASE_URL").unwrap_or(defaults.relay_base_url),
            relay_timeout,
            allowed_users,
            capacity_overrides,
            cors_origins: lookup("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    /// Get the full bind address (addr:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
