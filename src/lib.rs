pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod relay;
pub mod router;
pub mod sensors;
pub mod state;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use relay::{HttpRelayClient, RelayClient, RelayOutcome, RelayStatus};
pub use router::create_router;
pub use sensors::{Sample, SensorProfile, SensorRegistry, SensorType};
pub use state::GatewayState;
