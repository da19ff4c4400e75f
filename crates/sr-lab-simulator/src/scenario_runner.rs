use anyhow::{Context, anyhow, bail};
use sr_lab_abstract::{
    Message, SimConfig, TestAction, TestAssertion, TestScenario, TransportProtocol,
};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::{Simulator, validate_config};
use crate::trace::SimulationReport;

/// Simulated time after which a scenario without a `max_duration` assertion fails.
const DEFAULT_MAX_DURATION: u64 = 10_000;

pub fn load_scenario(path: &Path) -> anyhow::Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    parse_scenario(&content)
        .with_context(|| format!("Failed to parse scenario file {}", path.display()))
}

pub fn parse_scenario(content: &str) -> anyhow::Result<TestScenario> {
    toml::from_str(content).context("Failed to parse scenario")
}

/// Build a simulator with the scenario's channel settings and actions applied.
pub fn build_simulator(
    scenario: &TestScenario,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> anyhow::Result<Simulator> {
    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);
    validate_config(&config)?;

    let mut sim = Simulator::new(config, sender, receiver);
    for action in &scenario.actions {
        match action {
            TestAction::AppSend { time, data } => {
                let message = Message::from_bytes(data.as_bytes())
                    .with_context(|| format!("app_send at {time}"))?;
                sim.schedule_app_send(*time, message);
            }
            TestAction::GenerateMessages {
                count,
                interval,
                start,
            } => {
                sim.schedule_generated_messages(*count, *interval, *start);
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { ack } => {
                sim.add_drop_receiver_ack_once(*ack);
            }
            TestAction::CorruptNextFromSenderSeq { seq } => {
                sim.add_corrupt_sender_seq_once(*seq);
            }
            TestAction::CorruptNextFromReceiverAck { ack } => {
                sim.add_corrupt_receiver_ack_once(*ack);
            }
        }
    }
    Ok(sim)
}

pub fn run_scenario(
    scenario: &TestScenario,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> anyhow::Result<SimulationReport> {
    info!("Running Scenario: {}", scenario.name);
    info!("Description: {}", scenario.description);

    let mut sim = build_simulator(scenario, sender, receiver)?;
    sim.init();

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| {
            if let TestAssertion::MaxDuration { ms } = a {
                Some(*ms)
            } else {
                None
            }
        })
        .unwrap_or(DEFAULT_MAX_DURATION);

    if !sim.run_until(max_duration) {
        bail!("Test timed out after {} time units", max_duration);
    }

    let report = sim.export_report();
    for assertion in &scenario.assertions {
        check_assertion(assertion, &report)?;
    }

    info!("Test Scenario Passed!");
    Ok(report)
}

fn check_assertion(assertion: &TestAssertion, report: &SimulationReport) -> anyhow::Result<()> {
    match assertion {
        TestAssertion::DataDelivered { data } => {
            let expected = Message::from_bytes(data.as_bytes())?;
            let found = report
                .delivered_data
                .iter()
                .any(|d| d.as_slice() == expected.as_bytes());
            if !found {
                return Err(anyhow!(
                    "Assertion Failed: Data {:?} was not delivered",
                    data
                ));
            }
        }
        TestAssertion::DeliveredInOrder => {
            if !report.delivered_in_order() {
                return Err(anyhow!(
                    "Assertion Failed: {} messages accepted but {} delivered, or out of order",
                    report.accepted_data.len(),
                    report.delivered_data.len()
                ));
            }
        }
        TestAssertion::SenderPacketCount { min, max } => {
            if report.sender_packet_count < *min {
                return Err(anyhow!(
                    "Assertion Failed: Sender sent {} packets, expected min {}",
                    report.sender_packet_count,
                    min
                ));
            }
            if let Some(max) = max
                && report.sender_packet_count > *max
            {
                return Err(anyhow!(
                    "Assertion Failed: Sender sent {} packets, expected max {}",
                    report.sender_packet_count,
                    max
                ));
            }
        }
        TestAssertion::Counter { counter, min, max } => {
            let value = report.counters.get(*counter);
            if value < *min {
                return Err(anyhow!(
                    "Assertion Failed: counter {} is {}, expected min {}",
                    counter,
                    value,
                    min
                ));
            }
            if let Some(max) = max
                && value > *max
            {
                return Err(anyhow!(
                    "Assertion Failed: counter {} is {}, expected max {}",
                    counter,
                    value,
                    max
                ));
            }
        }
        TestAssertion::MaxInFlight { max } => {
            if report.max_in_flight > *max {
                return Err(anyhow!(
                    "Assertion Failed: {} packets in flight, expected at most {}",
                    report.max_in_flight,
                    max
                ));
            }
        }
        TestAssertion::MaxDuration { .. } => {} // Already checked
    }
    Ok(())
}
