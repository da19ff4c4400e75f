use crate::trace::{ChannelStats, SimulationReport};
use anyhow::ensure;
use rand::Rng;
use serde::Serialize;
use sr_lab_abstract::{Counter, Counters, Message, Packet, SimConfig};
use sr_lab_abstract::{SystemContext, TransportProtocol};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, info, warn};

/// Value the channel writes into a corrupted header field.
const CORRUPT_FIELD: u32 = 999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival {
        to: NodeId,
        packet: Packet,
    },
    TimerExpiry {
        node: NodeId,
        timer_id: u32,
        generation: u64,
    },
    AppSend {
        message: Message,
    },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultKind {
    Drop,
    Corrupt,
}

/// One-shot deterministic fault. Sender packets are matched on their
/// sequence number, receiver ACKs on their acknowledgment number.
#[derive(Debug, Clone, Copy)]
struct Fault {
    from: NodeId,
    number: u32,
    kind: FaultKind,
}

impl Fault {
    fn matches(&self, from: NodeId, packet: &Packet) -> bool {
        if self.from != from {
            return false;
        }
        match from {
            NodeId::Sender => !packet.is_ack() && packet.seq_num == self.number,
            NodeId::Receiver => packet.ack_num == Some(self.number),
        }
    }
}

/// Actions buffered during a protocol callback
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    timers_start: Vec<(u64, u32)>, // (delay, id)
    timers_cancel: Vec<u32>,
    logs: Vec<String>,
    delivered_data: Vec<Vec<u8>>,
    counters: Vec<Counter>,
}

/// Context implementation passed to the protocol
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl<'a> SystemContext for ScopedContext<'a> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, delay: u64, timer_id: u32) {
        self.buffer.timers_start.push((delay, timer_id));
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.buffer.timers_cancel.push(timer_id);
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.buffer.delivered_data.push(data.to_vec());
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn count(&mut self, counter: Counter) {
        self.buffer.counters.push(counter);
    }
}

/// Reject channel settings the emulator cannot run with.
pub fn validate_config(config: &SimConfig) -> anyhow::Result<()> {
    ensure!(
        (0.0..=1.0).contains(&config.loss_rate),
        "loss rate {} is not a probability",
        config.loss_rate
    );
    ensure!(
        (0.0..=1.0).contains(&config.corrupt_rate),
        "corruption rate {} is not a probability",
        config.corrupt_rate
    );
    ensure!(
        config.min_latency <= config.max_latency,
        "min latency {} exceeds max latency {}",
        config.min_latency,
        config.max_latency
    );
    Ok(())
}

pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    rng: rand::rngs::StdRng,

    pub sender: Box<dyn TransportProtocol>,
    pub receiver: Box<dyn TransportProtocol>,

    /// Messages the sender accepted, in the order it accepted them.
    pub accepted_data: Vec<Vec<u8>>,
    /// Messages refused by the sender (window full).
    pub rejected_sends: u32,
    /// Payloads handed to the receiving application, in delivery order.
    pub delivered_data: Vec<Vec<u8>>,
    pub sender_packet_count: u32,
    /// Largest number of unacknowledged packets seen at the sender.
    pub max_in_flight: usize,

    /// Protocol counters reported through `SystemContext::count`.
    pub counters: Counters,
    pub channel: ChannelStats,

    faults: Vec<Fault>,

    /// Timeline of link events (drops, corruptions, sends, deliveries).
    pub link_events: Vec<LinkEventSummary>,

    /// Timer generations to handle cancellation.
    /// Key: (node, timer_id), Value: generation counter
    timer_generations: HashMap<(NodeId, u32), u64>,

    /// Latest scheduled arrival per destination; the channel never reorders.
    last_arrival: HashMap<NodeId, u64>,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        sender: Box<dyn TransportProtocol>,
        receiver: Box<dyn TransportProtocol>,
    ) -> Self {
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            rng,
            sender,
            receiver,
            accepted_data: Vec::new(),
            rejected_sends: 0,
            delivered_data: Vec::new(),
            sender_packet_count: 0,
            max_in_flight: 0,
            counters: Counters::default(),
            channel: ChannelStats::default(),
            faults: Vec::new(),
            link_events: Vec::new(),
            timer_generations: HashMap::new(),
            last_arrival: HashMap::new(),
        }
    }

    /// Register a deterministic fault: drop the first packet sent by Sender whose seq equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: u32) {
        self.add_fault(NodeId::Sender, seq, FaultKind::Drop);
    }

    /// Register a deterministic fault: drop the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: u32) {
        self.add_fault(NodeId::Receiver, ack, FaultKind::Drop);
    }

    /// Register a deterministic fault: corrupt the first packet sent by Sender whose seq equals `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: u32) {
        self.add_fault(NodeId::Sender, seq, FaultKind::Corrupt);
    }

    /// Register a deterministic fault: corrupt the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_corrupt_receiver_ack_once(&mut self, ack: u32) {
        self.add_fault(NodeId::Receiver, ack, FaultKind::Corrupt);
    }

    fn add_fault(&mut self, from: NodeId, number: u32, kind: FaultKind) {
        self.faults.push(Fault { from, number, kind });
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, message: Message) {
        self.push_event(time, EventType::AppSend { message });
    }

    /// Schedule `count` generated messages (`aaaa…`, `bbbb…`, …) starting at
    /// `start`, with interarrival times drawn uniformly from `[0, 2 * interval]`.
    pub fn schedule_generated_messages(&mut self, count: u32, interval: u64, start: u64) {
        let mut time = start;
        for i in 0..count {
            time += self.rng.random_range(0..=2 * interval);
            let letter = b'a' + (i % 26) as u8;
            self.schedule_app_send(time, Message::filled(letter));
        }
    }

    pub fn init(&mut self) {
        {
            let mut buffer = ActionBuffer::default();
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            self.sender.init(&mut ctx);
            self.process_actions(NodeId::Sender, buffer);
        }
        {
            let mut buffer = ActionBuffer::default();
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            self.receiver.init(&mut ctx);
            self.process_actions(NodeId::Receiver, buffer);
        }
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Process the next event. Returns true if an event was processed, false if queue is empty.
    pub fn step(&mut self) -> bool {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::PacketArrival { to, packet } => {
                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    match to {
                        NodeId::Sender => self.sender.on_packet(&mut ctx, packet),
                        NodeId::Receiver => self.receiver.on_packet(&mut ctx, packet),
                    }
                }
                self.process_actions(to, buffer);
            }
            EventType::TimerExpiry {
                node,
                timer_id,
                generation,
            } => {
                let key = (node, timer_id);
                if self.timer_generations.get(&key) != Some(&generation) {
                    debug!("Skipping cancelled timer event for timer_id={}", timer_id);
                    return true;
                }

                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    match node {
                        NodeId::Sender => self.sender.on_timer(&mut ctx, timer_id),
                        NodeId::Receiver => self.receiver.on_timer(&mut ctx, timer_id),
                    }
                }
                self.process_actions(node, buffer);
            }
            EventType::AppSend { message } => {
                let mut buffer = ActionBuffer::default();
                let outcome = {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    self.sender.on_app_data(&mut ctx, &message)
                };
                match outcome {
                    Ok(()) => self.accepted_data.push(message.as_bytes().to_vec()),
                    Err(err) => {
                        warn!("[Sender] message {:?} rejected: {}", message, err);
                        self.rejected_sends += 1;
                        self.link_events.push(LinkEventSummary {
                            time: self.time,
                            description: format!("[Sender] REJECTED application message: {err}"),
                        });
                    }
                }
                self.process_actions(NodeId::Sender, buffer);
            }
        }
        true
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration: self.time,
            accepted_data: self.accepted_data.clone(),
            rejected_sends: self.rejected_sends,
            delivered_data: self.delivered_data.clone(),
            sender_packet_count: self.sender_packet_count,
            max_in_flight: self.max_in_flight,
            counters: self.counters.clone(),
            channel: self.channel.clone(),
            link_events: self.link_events.clone(),
        }
    }

    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    /// Step until the queue drains or the clock passes `deadline`.
    /// Returns `true` if the queue drained.
    pub fn run_until(&mut self, deadline: u64) -> bool {
        while let Some(next) = self.peek_next_event_time() {
            if next > deadline {
                return false;
            }
            self.step();
        }
        true
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        for counter in buffer.counters {
            self.counters.bump(counter);
        }

        for log in buffer.logs {
            info!("[{:?}] {}", source_node, log);
        }

        for data in buffer.delivered_data {
            info!("[{:?}] DELIVERED DATA: {} bytes", source_node, data.len());
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}] DELIVERED {:?} to application",
                    source_node,
                    String::from_utf8_lossy(&data)
                ),
            });
            self.channel.delivered += 1;
            self.delivered_data.push(data);
        }

        // Handle timer cancellations by incrementing the generation counter
        for timer_id in buffer.timers_cancel {
            let key = (source_node, timer_id);
            let generation = self.timer_generations.entry(key).or_insert(0);
            *generation += 1;
        }

        for (delay, id) in buffer.timers_start {
            let key = (source_node, id);
            let generation = *self.timer_generations.entry(key).or_insert(0);
            self.push_event(
                self.time + delay,
                EventType::TimerExpiry {
                    node: source_node,
                    timer_id: id,
                    generation,
                },
            );
        }

        for packet in buffer.outgoing_packets {
            if source_node == NodeId::Sender {
                self.sender_packet_count += 1;
            }
            self.transmit(source_node, packet);
        }

        if source_node == NodeId::Sender {
            self.max_in_flight = self.max_in_flight.max(self.sender.in_flight());
        }
    }

    /// Channel model: loss, corruption, then an order-preserving delay.
    fn transmit(&mut self, source_node: NodeId, mut packet: Packet) {
        let target_node = source_node.peer();
        self.channel.to_channel += 1;

        let fault = self
            .faults
            .iter()
            .position(|f| f.matches(source_node, &packet))
            .map(|pos| self.faults.remove(pos).kind);

        // 1. Check Loss
        let lost = match fault {
            Some(kind) => kind == FaultKind::Drop,
            None => self.rng.random::<f64>() < self.config.loss_rate,
        };
        if lost {
            self.channel.lost += 1;
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}->{:?}] DROP{} seq={} ack={:?}",
                    source_node,
                    target_node,
                    if fault.is_some() { " (deterministic)" } else { "" },
                    packet.seq_num,
                    packet.ack_num
                ),
            });
            debug!("Packet lost in channel");
            return;
        }

        // 2. Check Corruption
        let corrupt = match fault {
            Some(kind) => kind == FaultKind::Corrupt,
            None => self.rng.random::<f64>() < self.config.corrupt_rate,
        };
        if corrupt {
            self.channel.corrupted += 1;
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}->{:?}] CORRUPT seq={} ack={:?}",
                    source_node, target_node, packet.seq_num, packet.ack_num
                ),
            });
            debug!("Packet corrupted in channel");
            self.corrupt(&mut packet);
        }

        // 3. Latency, never overtaking an earlier packet on this link
        let latency = self
            .rng
            .random_range(self.config.min_latency..=self.config.max_latency);
        let last = self.last_arrival.get(&target_node).copied().unwrap_or(0);
        let arrival_time = (self.time + latency).max(last);
        self.last_arrival.insert(target_node, arrival_time);

        self.link_events.push(LinkEventSummary {
            time: self.time,
            description: format!(
                "[{:?}->{:?}] SEND seq={} ack={:?} (arrives at {})",
                source_node, target_node, packet.seq_num, packet.ack_num, arrival_time
            ),
        });

        self.push_event(
            arrival_time,
            EventType::PacketArrival {
                to: target_node,
                packet,
            },
        );
    }

    /// Overwrite part of the packet. The checksum field is never touched.
    fn corrupt(&mut self, packet: &mut Packet) {
        let x = self.rng.random::<f64>();
        if x < 0.75 {
            packet.payload[0] = b'Z';
        } else if x < 0.875 {
            packet.seq_num = CORRUPT_FIELD;
        } else {
            packet.ack_num = Some(CORRUPT_FIELD);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Simulator;
    use sr_lab_abstract::{Message, Packet, SendError, SimConfig, SystemContext, TransportProtocol};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default)]
    struct TimerProbe {
        timer_fired: Rc<Cell<bool>>,
        timer_cancelled: Rc<Cell<bool>>,
    }

    impl TransportProtocol for TimerProbe {
        fn init(&mut self, ctx: &mut dyn SystemContext) {
            ctx.start_timer(10, 0);
            // fires first and cancels timer 0
            ctx.start_timer(5, 1);
        }

        fn on_packet(&mut self, _ctx: &mut dyn SystemContext, _packet: Packet) {}

        fn on_timer(&mut self, ctx: &mut dyn SystemContext, timer_id: u32) {
            match timer_id {
                0 => self.timer_fired.set(true),
                1 => {
                    ctx.cancel_timer(0);
                    self.timer_cancelled.set(true);
                }
                _ => {}
            }
        }

        fn on_app_data(
            &mut self,
            _ctx: &mut dyn SystemContext,
            _message: &Message,
        ) -> Result<(), SendError> {
            Ok(())
        }
    }

    /// Sends every message straight to the channel; records what arrives.
    #[derive(Default)]
    struct Passthrough {
        next_seq: u32,
        arrivals: Rc<RefCell<Vec<Packet>>>,
    }

    impl TransportProtocol for Passthrough {
        fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
            ctx.deliver_data(&packet.payload);
            self.arrivals.borrow_mut().push(packet);
        }

        fn on_timer(&mut self, _ctx: &mut dyn SystemContext, _timer_id: u32) {}

        fn on_app_data(
            &mut self,
            ctx: &mut dyn SystemContext,
            message: &Message,
        ) -> Result<(), SendError> {
            ctx.send_packet(Packet::data(self.next_seq, message));
            self.next_seq += 1;
            Ok(())
        }
    }

    #[test]
    fn cancelled_timer_does_not_fire() {
        let sender = TimerProbe::default();
        let fired = sender.timer_fired.clone();
        let cancelled = sender.timer_cancelled.clone();

        let mut simulator = Simulator::new(
            SimConfig::default(),
            Box::new(sender),
            Box::new(TimerProbe::default()),
        );
        simulator.run_until_complete();

        assert!(cancelled.get(), "Timer should have been cancelled");
        assert!(!fired.get(), "Cancelled timer should not have fired");
    }

    #[test]
    fn channel_preserves_order_under_jitter() {
        let config = SimConfig {
            min_latency: 1,
            max_latency: 50,
            seed: 3,
            ..Default::default()
        };
        let receiver = Passthrough::default();
        let arrivals = receiver.arrivals.clone();
        let mut sim = Simulator::new(config, Box::new(Passthrough::default()), Box::new(receiver));
        for i in 0..40 {
            sim.schedule_app_send(i, Message::filled(b'a'));
        }
        sim.run_until_complete();

        let seqs: Vec<u32> = arrivals.borrow().iter().map(|p| p.seq_num).collect();
        assert_eq!(seqs, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn deterministic_faults_hit_once() {
        let receiver = Passthrough::default();
        let arrivals = receiver.arrivals.clone();
        let mut sim = Simulator::new(
            SimConfig::default(),
            Box::new(Passthrough::default()),
            Box::new(receiver),
        );
        sim.add_drop_sender_seq_once(1);
        sim.add_corrupt_sender_seq_once(2);
        for i in 0..4 {
            sim.schedule_app_send(i * 10, Message::filled(b'q'));
        }
        sim.run_until_complete();

        let arrivals = arrivals.borrow();
        let seqs: Vec<u32> = arrivals.iter().map(|p| p.seq_num).collect();
        assert!(!seqs.contains(&1));
        assert_eq!(sim.channel.lost, 1);
        assert_eq!(sim.channel.corrupted, 1);
        assert_eq!(sim.channel.to_channel, 4);
        // exactly one arrival differs from what was sent
        let untouched = arrivals
            .iter()
            .filter(|p| p.payload == [b'q'; 20] && p.ack_num.is_none() && p.seq_num < 4)
            .count();
        assert_eq!(untouched, 2);
    }

    #[test]
    fn generated_messages_cycle_through_alphabet() {
        let mut sim = Simulator::new(
            SimConfig::default(),
            Box::new(Passthrough::default()),
            Box::new(Passthrough::default()),
        );
        sim.schedule_generated_messages(28, 5, 0);
        sim.run_until_complete();
        assert_eq!(sim.accepted_data.len(), 28);
        assert_eq!(sim.accepted_data[0], vec![b'a'; 20]);
        assert_eq!(sim.accepted_data[25], vec![b'z'; 20]);
        assert_eq!(sim.accepted_data[26], vec![b'a'; 20]);
        assert_eq!(sim.delivered_data, sim.accepted_data);
    }
}
