//! In-memory `SystemContext` used by the unit tests.

use sr_lab_abstract::{Counter, Counters, Packet, SystemContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEvent {
    Sent(Packet),
    TimerStarted { delay: u64, id: u32 },
    TimerCancelled { id: u32 },
    Delivered(Vec<u8>),
}

#[derive(Default)]
pub struct RecordingContext {
    pub events: Vec<ContextEvent>,
    pub logs: Vec<String>,
    pub counters: Counters,
    pub now: u64,
}

impl RecordingContext {
    /// Packets sent since the last call, oldest first.
    pub fn take_sent(&mut self) -> Vec<Packet> {
        let mut sent = Vec::new();
        self.events.retain(|event| match event {
            ContextEvent::Sent(packet) => {
                sent.push(packet.clone());
                false
            }
            _ => true,
        });
        sent
    }

    pub fn delivered(&self) -> Vec<Vec<u8>> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ContextEvent::Delivered(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn timer_starts(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ContextEvent::TimerStarted { .. }))
            .count()
    }

    pub fn timer_cancels(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ContextEvent::TimerCancelled { .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.events.push(ContextEvent::Sent(packet));
    }

    fn start_timer(&mut self, delay: u64, timer_id: u32) {
        self.events.push(ContextEvent::TimerStarted {
            delay,
            id: timer_id,
        });
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.events.push(ContextEvent::TimerCancelled { id: timer_id });
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.events.push(ContextEvent::Delivered(data.to_vec()));
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn count(&mut self, counter: Counter) {
        self.counters.bump(counter);
    }
}
