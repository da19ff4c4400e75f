//! End-to-end runs of the Selective-Repeat entities over the emulated channel.

use sr_lab_abstract::{Message, SimConfig, TransportProtocol};
use sr_lab_protocol::{ArqConfig, pair};
use sr_lab_simulator::{Simulator, scenario_runner};

/// Fixed one-way latency keeps the timer/ACK interleaving predictable.
fn steady_channel() -> SimConfig {
    SimConfig {
        min_latency: 5,
        max_latency: 5,
        ..Default::default()
    }
}

fn simulator(config: SimConfig, arq: ArqConfig) -> Simulator {
    let (sender, receiver) = pair(arq).expect("valid protocol config");
    let mut sim = Simulator::new(config, sender, receiver);
    sim.init();
    sim
}

fn letters(n: u8) -> Vec<Vec<u8>> {
    (0..n).map(|i| vec![b'a' + i; 20]).collect()
}

#[test]
fn full_window_on_clean_channel() {
    let mut sim = simulator(steady_channel(), ArqConfig::classic());
    sim.schedule_generated_messages(6, 0, 0);
    assert!(sim.run_until(100));

    assert_eq!(sim.delivered_data, letters(6));
    assert_eq!(sim.counters.new_acks, 6);
    assert_eq!(sim.counters.total_acks_received, 6);
    assert_eq!(sim.counters.duplicate_acks, 0);
    assert_eq!(sim.counters.packets_resent, 0);
    assert_eq!(sim.sender.in_flight(), 0);
    // every ACK arrives one round trip after the burst, well inside one timeout
    let last_delivery = sim
        .link_events
        .iter()
        .filter(|e| e.description.contains("DELIVERED"))
        .map(|e| e.time)
        .max();
    assert_eq!(last_delivery, Some(5));
    assert!(
        !sim.link_events
            .iter()
            .any(|e| e.description.starts_with("[Sender->Receiver] SEND") && e.time > 0),
        "nothing is retransmitted"
    );
}

#[test]
fn lost_packet_is_the_only_one_resent() {
    let mut sim = simulator(steady_channel(), ArqConfig::classic());
    sim.add_drop_sender_seq_once(3);
    sim.schedule_generated_messages(6, 0, 0);
    assert!(sim.run_until(1_000));

    assert_eq!(sim.delivered_data, letters(6));
    assert_eq!(sim.counters.packets_resent, 1);
    assert_eq!(sim.sender_packet_count, 7);
    assert_eq!(sim.counters.packets_received, 6);
}

#[test]
fn corrupted_ack_does_not_advance_sender() {
    let mut sim = simulator(steady_channel(), ArqConfig::default());
    sim.add_corrupt_receiver_ack_once(2);
    sim.schedule_generated_messages(4, 0, 0);
    assert!(sim.run_until(1_000));

    assert_eq!(sim.delivered_data, letters(4));
    assert_eq!(sim.counters.corrupted_packets, 1);
    assert_eq!(sim.counters.new_acks, 4);
    // packet 2 had to be resent before its clean ack arrived
    assert_eq!(sim.counters.packets_resent, 1);
}

#[test]
fn seventh_message_is_refused_until_an_ack_arrives() {
    let mut sim = simulator(steady_channel(), ArqConfig::classic());
    sim.schedule_generated_messages(7, 0, 0);
    sim.schedule_app_send(20, Message::filled(b'x'));
    assert!(sim.run_until(1_000));

    assert_eq!(sim.rejected_sends, 1);
    assert_eq!(sim.counters.window_full, 1);
    assert_eq!(sim.max_in_flight, 6);

    let mut expected = letters(6);
    expected.push(vec![b'x'; 20]);
    assert_eq!(sim.accepted_data, expected);
    assert_eq!(sim.delivered_data, expected);
}

#[test]
fn in_order_exactly_once_under_loss_and_corruption() {
    for seed in [1, 7, 42, 99, 2024] {
        let config = SimConfig {
            loss_rate: 0.25,
            corrupt_rate: 0.25,
            seed,
            ..Default::default()
        };
        let arq = ArqConfig::default();
        let mut sim = simulator(config, arq);
        sim.schedule_generated_messages(150, 10, 0);
        assert!(sim.run_until(10_000_000), "seed {seed} did not finish");

        let report = sim.export_report();
        assert!(report.delivered_in_order(), "seed {seed}");
        assert!(!report.accepted_data.is_empty());
        assert!(report.max_in_flight <= arq.window_size as usize);
        assert!(report.channel.lost > 0 && report.channel.corrupted > 0);
        assert!(report.counters.packets_resent > 0);
    }
}

#[test]
fn wider_window_with_larger_sequence_space() {
    let config = SimConfig {
        loss_rate: 0.1,
        corrupt_rate: 0.1,
        seed: 5,
        ..Default::default()
    };
    let arq = ArqConfig {
        window_size: 6,
        seq_space: 12,
        ..ArqConfig::default()
    };
    let mut sim = simulator(config, arq);
    sim.schedule_generated_messages(200, 4, 0);
    assert!(sim.run_until(10_000_000));
    assert!(sim.export_report().delivered_in_order());
    assert!(sim.max_in_flight <= 6);
}

fn run_scenario_file(raw: &str) -> sr_lab_simulator::SimulationReport {
    let scenario = scenario_runner::parse_scenario(raw).expect("scenario parses");
    let arq = ArqConfig::from_override(&scenario.protocol);
    let (sender, receiver): (Box<dyn TransportProtocol>, Box<dyn TransportProtocol>) =
        pair(arq).expect("valid protocol config");
    scenario_runner::run_scenario(&scenario, sender, receiver)
        .unwrap_or_else(|err| panic!("{}: {err:#}", scenario.name))
}

#[test]
fn bundled_scenarios_pass() {
    let clean = run_scenario_file(include_str!("../../../scenarios/clean_window.toml"));
    assert_eq!(clean.delivered_data.len(), 6);
    assert_eq!(clean.delivered_data[0][..9], *b"message 0");

    let lost = run_scenario_file(include_str!("../../../scenarios/lost_packet.toml"));
    assert_eq!(lost.counters.packets_resent, 1);

    let corrupted = run_scenario_file(include_str!("../../../scenarios/corrupted_ack.toml"));
    assert_eq!(corrupted.counters.corrupted_packets, 1);

    let lossy = run_scenario_file(include_str!("../../../scenarios/lossy_channel.toml"));
    assert!(lossy.delivered_in_order());
}

#[test]
fn failed_assertion_is_reported() {
    let raw = r#"
        name = "impossible"
        description = "expects a retransmission on a perfect channel"

        [[actions]]
        type = "app_send"
        time = 0
        data = "only"

        [[assertions]]
        type = "counter"
        counter = "packets_resent"
        min = 1
    "#;
    let scenario = scenario_runner::parse_scenario(raw).unwrap();
    let (sender, receiver) = pair(ArqConfig::default()).unwrap();
    let err = scenario_runner::run_scenario(&scenario, sender, receiver).unwrap_err();
    assert!(err.to_string().contains("packets_resent"));
}

#[test]
fn oversized_app_send_is_rejected_up_front() {
    let raw = r#"
        name = "too long"
        description = "message larger than a packet payload"

        [[actions]]
        type = "app_send"
        time = 0
        data = "this message is definitely longer than twenty bytes"
    "#;
    let scenario = scenario_runner::parse_scenario(raw).unwrap();
    let (sender, receiver) = pair(ArqConfig::default()).unwrap();
    assert!(scenario_runner::build_simulator(&scenario, sender, receiver).is_err());
}
