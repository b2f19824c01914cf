pub mod can;
pub mod types;

pub use can::{CanBus, CanClient, CanFrame, SimulatedCanBus};
pub use types::CanSocketConfig;
