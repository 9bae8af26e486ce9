pub mod buffer;
pub mod directory;
pub mod session;
mod types;
pub mod websocket;

pub use buffer::{AppendOutcome, SessionBuffer};
pub use directory::{BufferInfo, BufferLease, SessionDirectory, SharedBuffer, UserId};
pub use session::{check_user_id, Inbound, IngestionSession, SessionContext, SessionState};
pub use types::{
    GatewayMessage, Outgoing, CAPACITY_REACHED_REASON, CLOSE_NORMAL, CLOSE_POLICY, POLICY_REASON,
};
pub use websocket::{
    handle_sensor_websocket, handle_user_sensor_websocket, handle_validate_user_websocket,
};
