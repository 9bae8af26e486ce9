pub mod decoder;
pub mod frame;
pub mod registry;

pub use decoder::{decode, Sample};
pub use frame::{Frame, FrameRejection};
pub use registry::{SensorProfile, SensorRegistry, SensorType};
