use serde::{Deserialize, Serialize};
use std::fmt;

/// Observability counters bumped by the protocol through `SystemContext::count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    PacketsResent,
    NewAcks,
    WindowFull,
    PacketsReceived,
    TotalAcksReceived,
    DuplicateAcks,
    CorruptedPackets,
}

impl Counter {
    pub const ALL: [Counter; 7] = [
        Counter::PacketsResent,
        Counter::NewAcks,
        Counter::WindowFull,
        Counter::PacketsReceived,
        Counter::TotalAcksReceived,
        Counter::DuplicateAcks,
        Counter::CorruptedPackets,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Counter::PacketsResent => "packets_resent",
            Counter::NewAcks => "new_acks",
            Counter::WindowFull => "window_full",
            Counter::PacketsReceived => "packets_received",
            Counter::TotalAcksReceived => "total_acks_received",
            Counter::DuplicateAcks => "duplicate_acks",
            Counter::CorruptedPackets => "corrupted_packets",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub packets_resent: u64,
    pub new_acks: u64,
    pub window_full: u64,
    pub packets_received: u64,
    pub total_acks_received: u64,
    pub duplicate_acks: u64,
    pub corrupted_packets: u64,
}

impl Counters {
    fn slot(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::PacketsResent => &mut self.packets_resent,
            Counter::NewAcks => &mut self.new_acks,
            Counter::WindowFull => &mut self.window_full,
            Counter::PacketsReceived => &mut self.packets_received,
            Counter::TotalAcksReceived => &mut self.total_acks_received,
            Counter::DuplicateAcks => &mut self.duplicate_acks,
            Counter::CorruptedPackets => &mut self.corrupted_packets,
        }
    }

    pub fn bump(&mut self, counter: Counter) {
        *self.slot(counter) += 1;
    }

    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::PacketsResent => self.packets_resent,
            Counter::NewAcks => self.new_acks,
            Counter::WindowFull => self.window_full,
            Counter::PacketsReceived => self.packets_received,
            Counter::TotalAcksReceived => self.total_acks_received,
            Counter::DuplicateAcks => self.duplicate_acks,
            Counter::CorruptedPackets => self.corrupted_packets,
        }
    }
}
