use serde::Serialize;
use sr_lab_abstract::{Counters, SimConfig};

use crate::engine::LinkEventSummary;

/// What the channel did with the packets handed to it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelStats {
    pub to_channel: u64,
    pub lost: u64,
    pub corrupted: u64,
    /// Payloads handed to the receiving application.
    pub delivered: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration: u64,
    pub accepted_data: Vec<Vec<u8>>,
    pub rejected_sends: u32,
    pub delivered_data: Vec<Vec<u8>>,
    pub sender_packet_count: u32,
    pub max_in_flight: usize,
    pub counters: Counters,
    pub channel: ChannelStats,
    pub link_events: Vec<LinkEventSummary>,
}

impl SimulationReport {
    /// Every accepted message reached the application once, in order.
    pub fn delivered_in_order(&self) -> bool {
        self.delivered_data == self.accepted_data
    }
}
