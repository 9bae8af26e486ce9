mod client;
mod payload;

pub use client::{HttpRelayClient, RelayClient, RelayOutcome, RelayStatus};
pub use payload::build_payload;
