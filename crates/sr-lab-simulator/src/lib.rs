pub mod engine;
pub mod scenario_runner;
pub mod trace;

pub use engine::{LinkEventSummary, NodeId, Simulator, validate_config};
pub use trace::{ChannelStats, SimulationReport};
