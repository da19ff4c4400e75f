use crate::config::SimConfig;
use crate::counters::Counter;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    #[serde(default)]
    pub protocol: ProtocolOverride,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

/// Protocol parameters a scenario may pin. Unset fields keep the protocol defaults.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProtocolOverride {
    /// Start from the classic assignment constants instead of the strict defaults.
    #[serde(default)]
    pub classic: bool,
    pub window_size: Option<u32>,
    pub seq_space: Option<u32>,
    pub timeout: Option<u64>,
    pub strict_seq_space: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application sends data at a specific time
    AppSend { time: u64, data: String },
    /// Let the traffic generator produce `count` messages starting at `start`
    GenerateMessages {
        count: u32,
        interval: u64,
        #[serde(default)]
        start: u64,
    },
    /// Deterministically drop the first packet sent by Sender with given seq number
    DropNextFromSenderSeq { seq: u32 },
    /// Deterministically drop the first ACK sent by Receiver with given ack number
    DropNextFromReceiverAck { ack: u32 },
    /// Deterministically corrupt the first packet sent by Sender with given seq number
    CorruptNextFromSenderSeq { seq: u32 },
    /// Deterministically corrupt the first ACK sent by Receiver with given ack number
    CorruptNextFromReceiverAck { ack: u32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Assert that specific data was delivered to the application layer
    DataDelivered { data: String },
    /// Assert that every accepted message was delivered exactly once, in order
    DeliveredInOrder,
    /// Assert that the total number of packets sent by Sender is within range
    SenderPacketCount { min: u32, max: Option<u32> },
    /// Assert that a protocol counter is within range
    Counter {
        counter: Counter,
        min: u64,
        max: Option<u64>,
    },
    /// Assert that the sender never had more than `max` packets outstanding
    MaxInFlight { max: usize },
    /// Assert that simulation finishes within time
    MaxDuration { ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_toml() {
        let raw = r#"
            name = "lost packet"
            description = "seq 3 never reaches the receiver"

            [config]
            seed = 7

            [protocol]
            classic = true

            [[actions]]
            type = "app_send"
            time = 0
            data = "hello"

            [[actions]]
            type = "drop_next_from_sender_seq"
            seq = 3

            [[assertions]]
            type = "counter"
            counter = "packets_resent"
            min = 1

            [[assertions]]
            type = "delivered_in_order"
        "#;
        let scenario: TestScenario = toml::from_str(raw).unwrap();
        assert_eq!(scenario.config.seed, Some(7));
        assert!(scenario.protocol.classic);
        assert_eq!(scenario.actions.len(), 2);
        assert!(matches!(
            scenario.assertions[0],
            TestAssertion::Counter {
                counter: Counter::PacketsResent,
                min: 1,
                max: None
            }
        ));
        assert!(matches!(
            scenario.assertions[1],
            TestAssertion::DeliveredInOrder
        ));
    }

    #[test]
    fn override_only_touches_set_fields() {
        let mut config = SimConfig::default();
        let over = SimConfigOverride {
            loss_rate: Some(0.2),
            ..Default::default()
        };
        over.apply_to(&mut config);
        assert_eq!(config.loss_rate, 0.2);
        assert_eq!(config.max_latency, SimConfig::default().max_latency);
    }
}
