//! Additive packet checksum.
//!
//! The code is the wrapping sum of the sequence number, the acknowledgment
//! number and every payload byte. It is cheap and matches the channel's
//! corruption model (overwritten bytes and header fields); it is not meant
//! to resist deliberate tampering.

use sr_lab_abstract::Packet;

/// Value the "not in use" acknowledgment field contributes to the sum (-1).
const NOT_IN_USE: u32 = u32::MAX;

pub fn compute_checksum(packet: &Packet) -> u32 {
    let header = packet
        .seq_num
        .wrapping_add(packet.ack_num.unwrap_or(NOT_IN_USE));
    packet
        .payload
        .iter()
        .fold(header, |sum, &byte| sum.wrapping_add(byte as u32))
}

/// Must be checked before any other field of an incoming packet is trusted.
pub fn is_corrupted(packet: &Packet) -> bool {
    packet.checksum != compute_checksum(packet)
}

/// Fill in the checksum of a freshly built packet.
pub fn seal(mut packet: Packet) -> Packet {
    packet.checksum = compute_checksum(&packet);
    packet
}
