use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Size in bytes of every application message and packet payload.
pub const PAYLOAD_SIZE: usize = 20;

/// Byte used to fill the payload of acknowledgment packets.
pub const ACK_FILL: u8 = b'0';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message is {len} bytes, at most {PAYLOAD_SIZE} fit in a packet")]
    TooLong { len: usize },
}

/// A fixed-size unit of application data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message([u8; PAYLOAD_SIZE]);

impl Message {
    pub const fn new(data: [u8; PAYLOAD_SIZE]) -> Self {
        Self(data)
    }

    /// Build a message from at most `PAYLOAD_SIZE` bytes, zero-padding the rest.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MessageError> {
        if data.len() > PAYLOAD_SIZE {
            return Err(MessageError::TooLong { len: data.len() });
        }
        let mut buf = [0u8; PAYLOAD_SIZE];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self(buf))
    }

    /// A message made of one repeated byte, as produced by the traffic generator.
    pub const fn filled(byte: u8) -> Self {
        Self([byte; PAYLOAD_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; PAYLOAD_SIZE] {
        &self.0
    }

    /// The message contents without trailing zero padding.
    pub fn trimmed(&self) -> &[u8] {
        let end = self
            .0
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |idx| idx + 1);
        &self.0[..end]
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message({:?})", String::from_utf8_lossy(self.trimmed()))
    }
}

impl TryFrom<&[u8]> for Message {
    type Error = MessageError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(data)
    }
}

/// The unit exchanged over the simulated channel.
///
/// `ack_num` is `None` on data packets (the "not in use" marker). The
/// checksum is left at zero by the constructors and filled in by the
/// protocol before the packet is handed to the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub seq_num: u32,
    pub ack_num: Option<u32>,
    pub payload: [u8; PAYLOAD_SIZE],
    pub checksum: u32,
}

impl Packet {
    /// Create a data packet carrying `message`.
    pub fn data(seq_num: u32, message: &Message) -> Self {
        Self {
            seq_num,
            ack_num: None,
            payload: *message.as_bytes(),
            checksum: 0,
        }
    }

    /// Create a pure ACK packet. The payload carries no application data.
    pub fn ack(ack_num: u32) -> Self {
        Self {
            seq_num: 0,
            ack_num: Some(ack_num),
            payload: [ACK_FILL; PAYLOAD_SIZE],
            checksum: 0,
        }
    }

    pub fn is_ack(&self) -> bool {
        self.ack_num.is_some()
    }

    pub fn message(&self) -> Message {
        Message::new(self.payload)
    }
}
