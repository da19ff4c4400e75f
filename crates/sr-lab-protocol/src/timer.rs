use sr_lab_abstract::SystemContext;

/// Timer id used for the sender's single retransmission timer.
pub const RETRANSMIT_TIMER: u32 = 0;

/// The sender's single logical retransmission timer.
///
/// Tracks which sequence number the running timer covers so that callers
/// never have to infer it from the order of start/stop calls. Starting a
/// running timer or stopping a stopped one is a logged no-op.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    timeout: u64,
    covering: Option<u32>,
}

impl RetransmitTimer {
    pub fn new(timeout: u64) -> Self {
        Self {
            timeout,
            covering: None,
        }
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    /// Sequence number the running timer covers.
    pub fn covering(&self) -> Option<u32> {
        self.covering
    }

    pub fn is_running(&self) -> bool {
        self.covering.is_some()
    }

    /// Returns `false` without touching the channel if the timer is already running.
    pub fn start(&mut self, ctx: &mut dyn SystemContext, seq: u32) -> bool {
        if let Some(current) = self.covering {
            ctx.log(&format!(
                "timer already running for packet {current}, ignoring start for {seq}"
            ));
            return false;
        }
        ctx.start_timer(self.timeout, RETRANSMIT_TIMER);
        self.covering = Some(seq);
        true
    }

    /// Returns `false` if the timer was not running.
    pub fn stop(&mut self, ctx: &mut dyn SystemContext) -> bool {
        match self.covering.take() {
            Some(_) => {
                ctx.cancel_timer(RETRANSMIT_TIMER);
                true
            }
            None => {
                ctx.log("timer already stopped");
                false
            }
        }
    }

    /// Cancel the running timer, if any, and start it again for `seq`.
    pub fn restart(&mut self, ctx: &mut dyn SystemContext, seq: u32) {
        if self.covering.take().is_some() {
            ctx.cancel_timer(RETRANSMIT_TIMER);
        }
        self.start(ctx, seq);
    }

    /// Record that the channel fired the timer. Returns the sequence number it covered.
    pub fn expired(&mut self) -> Option<u32> {
        self.covering.take()
    }

    /// Forget any running timer without notifying the channel.
    pub(crate) fn reset(&mut self) {
        self.covering = None;
    }
}
