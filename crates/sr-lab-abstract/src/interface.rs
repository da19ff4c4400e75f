use crate::counters::Counter;
use crate::packet::{Message, Packet};
use thiserror::Error;

/// Why the application layer's message was not accepted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The send window already holds the maximum number of unacknowledged packets.
    #[error("send window is full (base={base}, next_seq={next_seq})")]
    WindowFull { base: u32, next_seq: u32 },
    /// This side of the connection carries no application traffic.
    #[error("this endpoint does not send application data")]
    Unsupported,
}

/// The capability provided by the simulator to a protocol entity.
/// Protocol code calls these methods to interact with the channel and the application layer.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel.
    fn send_packet(&mut self, packet: Packet);

    /// Start a single-shot timer.
    /// `timer_id` identifies the timer so it can be cancelled later.
    /// `delay` is measured in simulated time units.
    fn start_timer(&mut self, delay: u64, timer_id: u32);

    /// Cancel a running timer. Cancelling a timer that is not running has no effect.
    fn cancel_timer(&mut self, timer_id: u32);

    /// Deliver an in-order payload to the application layer.
    fn deliver_data(&mut self, data: &[u8]);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, message: &str);

    /// Current simulation time.
    fn now(&self) -> u64;

    /// Bump an observability counter. Counters never influence protocol decisions.
    fn count(&mut self, _counter: Counter) {}
}

/// The interface every protocol entity implements.
pub trait TransportProtocol {
    /// Called once when the simulation starts, before any other callback.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when a packet arrives from the channel.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// Called when a timer expires.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext, timer_id: u32);

    /// Called when the application layer hands over a message for reliable delivery.
    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, message: &Message)
    -> Result<(), SendError>;

    /// Number of packets sent but not yet acknowledged.
    fn in_flight(&self) -> usize {
        0
    }
}
