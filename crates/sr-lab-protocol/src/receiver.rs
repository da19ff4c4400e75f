//! Selective-Repeat receive side (entity B).

use std::collections::VecDeque;

use sr_lab_abstract::{Counter, Message, Packet, SendError, SystemContext, TransportProtocol};
use tracing::warn;

use crate::checksum;
use crate::config::{ArqConfig, ConfigError};
use crate::seq::SeqSpace;

/// Receive window: slot `i` holds the packet for `base + i`, if it arrived.
#[derive(Debug)]
pub struct SrReceiver {
    config: ArqConfig,
    space: SeqSpace,
    base: u32,
    slots: VecDeque<Option<Packet>>,
}

impl SrReceiver {
    pub fn new(config: ArqConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if !config.is_unambiguous() {
            warn!(
                window_size = config.window_size,
                seq_space = config.seq_space,
                "receiver running with overlapping sequence windows"
            );
        }
        Ok(Self {
            config,
            space: SeqSpace::new(config.seq_space),
            base: 0,
            slots: empty_slots(config.window_size),
        })
    }

    /// Next sequence number to be delivered.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Sequence numbers buffered out of order, in window order.
    pub fn buffered(&self) -> Vec<u32> {
        self.slots
            .iter()
            .flatten()
            .map(|packet| packet.seq_num)
            .collect()
    }

    /// Last sequence number delivered in order.
    fn last_delivered(&self) -> u32 {
        self.space.prev(self.base)
    }

    fn send_ack(&self, ctx: &mut dyn SystemContext, ack_num: u32) {
        ctx.log(&format!("sending ACK {ack_num}"));
        ctx.send_packet(checksum::seal(Packet::ack(ack_num)));
    }

    /// Deliver the contiguous run of buffered packets starting at `base`.
    fn drain(&mut self, ctx: &mut dyn SystemContext) {
        while self.slots.front().is_some_and(Option::is_some) {
            if let Some(Some(packet)) = self.slots.pop_front() {
                ctx.log(&format!("delivering packet {} to layer 5", packet.seq_num));
                ctx.deliver_data(&packet.payload);
            }
            self.slots.push_back(None);
            self.base = self.space.next(self.base);
        }
    }

    pub fn on_data(&mut self, ctx: &mut dyn SystemContext, packet: &Packet) {
        if checksum::is_corrupted(packet) {
            ctx.log("corrupted packet received, resending last ACK");
            ctx.count(Counter::CorruptedPackets);
            self.send_ack(ctx, self.last_delivered());
            return;
        }
        if packet.is_ack() {
            ctx.log("ACK received at receiver, ignored");
            return;
        }

        let seq = packet.seq_num;
        let window = self.config.window_size;
        let rel = self.space.distance(self.base, seq);

        if rel < window {
            let slot = &mut self.slots[rel as usize];
            if slot.is_none() {
                *slot = Some(packet.clone());
                ctx.log(&format!("packet {seq} correctly received"));
                ctx.count(Counter::PacketsReceived);
            } else {
                ctx.log(&format!("packet {seq} already buffered"));
            }
            self.drain(ctx);
            self.send_ack(ctx, seq);
        } else if self.space.distance(seq, self.base) <= window {
            // already delivered; the sender missed our ACK
            ctx.log(&format!("duplicate of delivered packet {seq}, re-ACK"));
            self.send_ack(ctx, seq);
        } else {
            ctx.log(&format!(
                "packet {seq} outside receive window [{}, +{window})",
                self.base
            ));
            self.send_ack(ctx, self.last_delivered());
        }
    }
}

fn empty_slots(window_size: u32) -> VecDeque<Option<Packet>> {
    std::iter::repeat_n(None, window_size as usize).collect()
}

impl TransportProtocol for SrReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.base = 0;
        self.slots = empty_slots(self.config.window_size);
        ctx.log("SR receiver ready");
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        self.on_data(ctx, &packet);
    }

    /// The receiver runs no timers in a one-way transfer.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext, timer_id: u32) {
        ctx.log(&format!("receiver timer {timer_id} fired, ignored"));
    }

    /// Reverse-direction data would be sent here in a bidirectional transfer.
    fn on_app_data(
        &mut self,
        ctx: &mut dyn SystemContext,
        _message: &Message,
    ) -> Result<(), SendError> {
        ctx.log("receiver carries no application traffic, message dropped");
        Err(SendError::Unsupported)
    }
}
