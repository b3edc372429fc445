//! Fixed 14-byte packet header.
//!
//! ```text
//! +---------+------+-----------+--------+-----------+--------+--------+
//! | command | size | packet_id | repeat | transport | origin | target |
//! |   u8    |  u8  |    u16    |   u8   |    u8     |  u32   |  u32   |
//! +---------+------+-----------+--------+-----------+--------+--------+
//! ```
//!
//! All multi-byte fields big-endian. `size` is the payload length in bytes
//! (header and CRC excluded). `packet_id` comes from the sender's
//! monotonically increasing counter and wraps at 2^16. `repeat` counts
//! retransmissions, zero for a fresh packet.

use crate::DecodeError;
use crate::types::{Command, TransportType};
use std::fmt;

/// Encoded header size in bytes.
pub const SIZE: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub command: Command,
    pub size: u8,
    pub packet_id: u16,
    pub repeat: u8,
    pub transport: TransportType,
    pub origin: u32,
    pub target: u32,
}

impl Header {
    pub fn encode(&self) -> [u8; SIZE] {
        let mut out = [0u8; SIZE];
        out[0] = self.command as u8;
        out[1] = self.size;
        out[2..4].copy_from_slice(&self.packet_id.to_be_bytes());
        out[4] = self.repeat;
        out[5] = self.transport as u8;
        out[6..10].copy_from_slice(&self.origin.to_be_bytes());
        out[10..14].copy_from_slice(&self.target.to_be_bytes());
        out
    }

    /// Decode the first [`SIZE`] bytes of `data`.
    ///
    /// Fails on out-of-range command or transport discriminants. `size` is
    /// not checked against the buffer here; that is the packet-level check.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let data: &[u8; SIZE] = data
            .get(..SIZE)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(DecodeError::TooSmall {
                min: SIZE,
                size: data.len(),
            })?;

        Ok(Header {
            command: Command::try_from(data[0])?,
            size: data[1],
            packet_id: u16::from_be_bytes([data[2], data[3]]),
            repeat: data[4],
            transport: TransportType::try_from(data[5])?,
            origin: u32::from_be_bytes([data[6], data[7], data[8], data[9]]),
            target: u32::from_be_bytes([data[10], data[11], data[12], data[13]]),
        })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} r{} {} 0x{:X} -> 0x{:X}",
            self.command, self.packet_id, self.repeat, self.transport, self.origin, self.target
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            command: Command::Status,
            size: 6,
            packet_id: 0x0102,
            repeat: 3,
            transport: TransportType::Broadcast,
            origin: 0xAABBCCDD,
            target: 0x00112233,
        }
    }

    #[test]
    fn known_byte_layout() {
        assert_eq!(
            sample().encode(),
            [
                0x05, 0x06, 0x01, 0x02, 0x03, 0x02, 0xAA, 0xBB, 0xCC, 0xDD, 0x00, 0x11, 0x22, 0x33
            ]
        );
    }

    #[test]
    fn round_trip() {
        let header = sample();
        assert_eq!(Header::decode(&header.encode()).unwrap(), header);
    }

    #[test]
    fn unknown_command() {
        let mut bytes = sample().encode();
        bytes[0] = 0x42;
        assert_eq!(
            Header::decode(&bytes),
            Err(DecodeError::UnknownCommand(0x42))
        );
    }

    #[test]
    fn unknown_transport() {
        let mut bytes = sample().encode();
        bytes[5] = 9;
        assert_eq!(Header::decode(&bytes), Err(DecodeError::UnknownTransport(9)));
    }

    #[test]
    fn truncated_buffer() {
        assert_eq!(
            Header::decode(&[0u8; 4]),
            Err(DecodeError::TooSmall { min: SIZE, size: 4 })
        );
    }

    #[test]
    fn display_spelling() {
        assert_eq!(
            sample().to_string(),
            "STATUS #258 r3 BROADCAST 0xAABBCCDD -> 0x112233"
        );
    }
}
