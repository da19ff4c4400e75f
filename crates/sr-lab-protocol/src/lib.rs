//! Selective-Repeat ARQ sender and receiver.
//!
//! Both entities are plain state objects driven through
//! [`TransportProtocol`]; all interaction with the channel, timers and the
//! application goes through the [`SystemContext`] they are handed.

pub mod checksum;
pub mod config;
pub mod receiver;
pub mod sender;
pub mod seq;
pub mod timer;

#[cfg(test)]
mod testing;

pub use config::{ArqConfig, ConfigError};
pub use receiver::SrReceiver;
pub use sender::SrSender;
pub use seq::SeqSpace;
pub use timer::{RETRANSMIT_TIMER, RetransmitTimer};

pub use sr_lab_abstract::{Packet, SystemContext, TransportProtocol};

pub fn sender(config: ArqConfig) -> Result<Box<dyn TransportProtocol>, ConfigError> {
    Ok(Box::new(SrSender::new(config)?))
}

pub fn receiver(config: ArqConfig) -> Result<Box<dyn TransportProtocol>, ConfigError> {
    Ok(Box::new(SrReceiver::new(config)?))
}

/// A validated sender/receiver pair sharing one configuration.
pub fn pair(
    config: ArqConfig,
) -> Result<(Box<dyn TransportProtocol>, Box<dyn TransportProtocol>), ConfigError> {
    Ok((sender(config)?, receiver(config)?))
}
