use serde::{Deserialize, Serialize};
use sr_lab_abstract::ProtocolOverride;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    EmptyWindow,
    #[error("sequence space {seq_space} must be larger than the window ({window_size})")]
    SequenceSpaceTooSmall { window_size: u32, seq_space: u32 },
    #[error(
        "sequence space {seq_space} cannot tell old and new packets apart with a window of {window_size}; it must be at least twice the window"
    )]
    AmbiguousSequenceSpace { window_size: u32, seq_space: u32 },
    #[error("retransmission timeout must be non-zero")]
    ZeroTimeout,
}

/// Parameters shared by both protocol entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArqConfig {
    /// Maximum number of unacknowledged packets at the sender, and the
    /// number of sequence numbers the receiver accepts ahead of its base.
    pub window_size: u32,
    /// Size of the modular sequence-number ring.
    pub seq_space: u32,
    /// Retransmission timeout (round-trip time), in simulated time units.
    pub timeout: u64,
    /// Reject sequence spaces smaller than twice the window.
    pub strict_seq_space: bool,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            window_size: 4,
            seq_space: 8,
            timeout: 16,
            strict_seq_space: true,
        }
    }
}

impl ArqConfig {
    /// The classic assignment constants: a window of 6 in a ring of 8.
    ///
    /// This violates `seq_space >= 2 * window_size`, so strict checking is
    /// switched off. It works on lightly impaired channels but a
    /// retransmission can be mistaken for a new packet after a wrap.
    pub fn classic() -> Self {
        Self {
            window_size: 6,
            seq_space: 8,
            timeout: 16,
            strict_seq_space: false,
        }
    }

    pub fn from_override(over: &ProtocolOverride) -> Self {
        let mut config = if over.classic {
            Self::classic()
        } else {
            Self::default()
        };
        if let Some(v) = over.window_size {
            config.window_size = v;
        }
        if let Some(v) = over.seq_space {
            config.seq_space = v;
        }
        if let Some(v) = over.timeout {
            config.timeout = v;
        }
        if let Some(v) = over.strict_seq_space {
            config.strict_seq_space = v;
        }
        config
    }

    /// Whether every in-flight sequence number is unique across the sender
    /// and receiver windows.
    pub fn is_unambiguous(&self) -> bool {
        self.seq_space as u64 >= 2 * self.window_size as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if self.seq_space <= self.window_size {
            return Err(ConfigError::SequenceSpaceTooSmall {
                window_size: self.window_size,
                seq_space: self.seq_space,
            });
        }
        if self.strict_seq_space && !self.is_unambiguous() {
            return Err(ConfigError::AmbiguousSequenceSpace {
                window_size: self.window_size,
                seq_space: self.seq_space,
            });
        }
        if self.timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
