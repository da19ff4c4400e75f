//! Selective-Repeat send side (entity A).
//!
//! The send window is a ring of at most `window_size` slots whose front is
//! always `base`. A slot exists (is valid) exactly while its sequence number
//! lies in `[base, next_seq)`; sliding the window pops retired slots off the
//! front, so a sequence number reused after a wrap can never see stale state.
//!
//! ```text
//!   base                next_seq
//!    │                     │
//!  ──┼──┬──┬──┬──┬─────────┼───────────▶ seq ring
//!    │un│ok│un│ok│         │
//!    └──── in window ──────┘
//! ```

use std::collections::VecDeque;

use sr_lab_abstract::{Counter, Message, Packet, SendError, SystemContext, TransportProtocol};
use tracing::warn;

use crate::checksum;
use crate::config::{ArqConfig, ConfigError};
use crate::seq::SeqSpace;
use crate::timer::{RETRANSMIT_TIMER, RetransmitTimer};

#[derive(Debug, Clone)]
struct SendSlot {
    packet: Packet,
    acknowledged: bool,
}

#[derive(Debug)]
pub struct SrSender {
    config: ArqConfig,
    space: SeqSpace,
    base: u32,
    next_seq: u32,
    window: VecDeque<SendSlot>,
    timer: RetransmitTimer,
}

impl SrSender {
    pub fn new(config: ArqConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if !config.is_unambiguous() {
            warn!(
                window_size = config.window_size,
                seq_space = config.seq_space,
                "sender running with overlapping sequence windows"
            );
        }
        Ok(Self {
            config,
            space: SeqSpace::new(config.seq_space),
            base: 0,
            next_seq: 0,
            window: VecDeque::with_capacity(config.window_size as usize),
            timer: RetransmitTimer::new(config.timeout),
        })
    }

    pub fn config(&self) -> &ArqConfig {
        &self.config
    }

    /// Oldest sequence number not yet acknowledged.
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn timer(&self) -> &RetransmitTimer {
        &self.timer
    }

    /// Sequence numbers currently occupying the window, acknowledged or not.
    pub fn window_count(&self) -> u32 {
        self.space.distance(self.base, self.next_seq)
    }

    /// Valid slots still waiting for their acknowledgment.
    pub fn outstanding(&self) -> usize {
        self.window.iter().filter(|slot| !slot.acknowledged).count()
    }

    pub fn is_idle(&self) -> bool {
        self.base == self.next_seq
    }

    /// Whether `seq` has a valid slot that has been acknowledged.
    pub fn is_acknowledged(&self, seq: u32) -> bool {
        self.slot(seq).is_some_and(|slot| slot.acknowledged)
    }

    fn slot(&self, seq: u32) -> Option<&SendSlot> {
        self.window
            .get(self.space.distance(self.base, seq) as usize)
    }

    fn reset(&mut self) {
        self.base = 0;
        self.next_seq = 0;
        self.window.clear();
        self.timer.reset();
    }

    /// Packetize and transmit `message` if the window has room.
    ///
    /// Returns the sequence number the message was sent under. A full window
    /// drops the message; the application layer has to offer it again.
    pub fn output(
        &mut self,
        ctx: &mut dyn SystemContext,
        message: &Message,
    ) -> Result<u32, SendError> {
        if self.window_count() >= self.config.window_size {
            ctx.log("new message arrives, send window is full");
            ctx.count(Counter::WindowFull);
            return Err(SendError::WindowFull {
                base: self.base,
                next_seq: self.next_seq,
            });
        }

        let seq = self.next_seq;
        let packet = checksum::seal(Packet::data(seq, message));
        ctx.log(&format!("sending packet {seq}"));
        ctx.send_packet(packet.clone());

        let was_idle = self.is_idle();
        self.window.push_back(SendSlot {
            packet,
            acknowledged: false,
        });
        if was_idle {
            self.timer.start(ctx, seq);
        }
        self.next_seq = self.space.next(seq);
        Ok(seq)
    }

    pub fn on_ack(&mut self, ctx: &mut dyn SystemContext, packet: &Packet) {
        if checksum::is_corrupted(packet) {
            ctx.log("corrupted ACK received, ignored");
            ctx.count(Counter::CorruptedPackets);
            return;
        }
        let Some(ack) = packet.ack_num else {
            ctx.log(&format!(
                "data packet {} received at sender, ignored",
                packet.seq_num
            ));
            return;
        };
        ctx.count(Counter::TotalAcksReceived);

        let rel = self.space.distance(self.base, ack);
        let slot = match self.window.get_mut(rel as usize) {
            Some(slot) if !slot.acknowledged => slot,
            Some(_) => {
                ctx.log(&format!("duplicate ACK {ack} received, nothing to do"));
                ctx.count(Counter::DuplicateAcks);
                return;
            }
            None => {
                ctx.log(&format!(
                    "ACK {ack} outside window [{}, +{}), ignored",
                    self.base, self.config.window_size
                ));
                ctx.count(Counter::DuplicateAcks);
                return;
            }
        };

        slot.acknowledged = true;
        ctx.log(&format!("ACK {ack} is new"));
        ctx.count(Counter::NewAcks);

        while self.window.front().is_some_and(|slot| slot.acknowledged) {
            self.window.pop_front();
            self.base = self.space.next(self.base);
        }

        if self.is_idle() {
            self.timer.stop(ctx);
        } else {
            self.timer.restart(ctx, self.base);
        }
    }

    /// Retransmit every unacknowledged packet in the window, oldest first.
    pub fn on_timeout(&mut self, ctx: &mut dyn SystemContext) {
        let covered = self.timer.expired();
        if self.window.is_empty() {
            ctx.log("timeout with an empty window, ignored");
            return;
        }
        ctx.log(&format!(
            "timeout (timer covered {}), resending unacknowledged packets",
            covered.map_or_else(|| "nothing".to_string(), |seq| seq.to_string())
        ));

        for slot in self.window.iter().filter(|slot| !slot.acknowledged) {
            ctx.log(&format!("resending packet {}", slot.packet.seq_num));
            ctx.send_packet(slot.packet.clone());
            ctx.count(Counter::PacketsResent);
        }
        self.timer.start(ctx, self.base);
    }
}

impl TransportProtocol for SrSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        if self.timer.is_running() {
            ctx.cancel_timer(RETRANSMIT_TIMER);
        }
        self.reset();
        ctx.log(&format!(
            "SR sender ready (window={}, seq space={}, timeout={})",
            self.config.window_size, self.config.seq_space, self.config.timeout
        ));
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        self.on_ack(ctx, &packet);
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext, timer_id: u32) {
        if timer_id != RETRANSMIT_TIMER {
            ctx.log(&format!("unknown timer {timer_id} fired, ignored"));
            return;
        }
        self.on_timeout(ctx);
    }

    fn on_app_data(
        &mut self,
        ctx: &mut dyn SystemContext,
        message: &Message,
    ) -> Result<(), SendError> {
        self.output(ctx, message).map(|_| ())
    }

    fn in_flight(&self) -> usize {
        self.outstanding()
    }
}
