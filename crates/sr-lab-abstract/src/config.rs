use serde::{Deserialize, Serialize};

/// Channel emulator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Probability that a packet is lost in the channel.
    pub loss_rate: f64,
    /// Probability that a packet is corrupted in the channel.
    pub corrupt_rate: f64,
    /// One-way latency bounds, in simulated time units.
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
    /// Number of messages produced by the traffic generator.
    pub message_count: u32,
    /// Mean time between generated messages.
    pub message_interval: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            min_latency: 1,
            max_latency: 9,
            seed: 0,
            message_count: 10,
            message_interval: 50,
        }
    }
}
