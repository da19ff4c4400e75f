pub mod config;
pub mod counters;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use interface::{SendError, SystemContext, TransportProtocol};
pub use packet::{ACK_FILL, Message, MessageError, PAYLOAD_SIZE, Packet};

pub use config::SimConfig;
pub use counters::{Counter, Counters};
pub use scenario::{ProtocolOverride, SimConfigOverride, TestAction, TestAssertion, TestScenario};
