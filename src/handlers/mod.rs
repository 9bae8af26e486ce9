mod buffers;
mod health;

pub use buffers::*;
pub use health::*;
