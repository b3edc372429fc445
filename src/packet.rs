//! Packet assembly: header, payload and CRC under the salted XOR layer.
//!
//! A plaintext packet is `header(14) | payload(0..48) | crc16(2)` with the
//! CRC computed over header and payload. [`Packet::encode`] seals that
//! buffer with [`crate::crypt`], which prepends two salt bytes, so the
//! smallest on-air frame is 18 bytes and the largest allowed is 64.
//!
//! Decoding reverses the steps and rejects, in order: out-of-bounds frame
//! size, CRC mismatch, malformed header, and a payload that is not exactly
//! `header.size` bytes.

use crate::DecodeError;
use crate::header::{self, Header};
use crate::payload::Payload;
use crate::types::{Key, TransportType};
use crate::{crc, crypt};
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};

/// Smallest possible on-air frame: salt + empty-payload header + CRC.
pub const MIN_WIRE_SIZE: usize = crypt::SALT_SIZE + header::SIZE + crc::SIZE;
/// Largest accepted on-air frame.
pub const MAX_WIRE_SIZE: usize = 64;

/// Monotonic `packet_id` source, wrapping at 2^16.
///
/// One counter exists per station and lives in the [`crate::Network`];
/// only the radio thread allocates from it, but the atomic keeps it
/// correct if a sender ever moves off that thread.
#[derive(Debug, Default)]
pub struct PacketIdCounter(AtomicU16);

impl PacketIdCounter {
    pub fn new() -> Self {
        Self(AtomicU16::new(0))
    }

    /// Allocate the next id. Wraps silently.
    pub fn next_id(&self) -> u16 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Payload,
}

impl Packet {
    /// Compose a fresh packet: allocate a `packet_id`, zero the repeat
    /// counter, and derive command and size from the payload.
    pub fn create(
        ids: &PacketIdCounter,
        transport: TransportType,
        origin: u32,
        target: u32,
        payload: Payload,
    ) -> Self {
        let header = Header {
            command: payload.command(),
            size: payload.encoded_len() as u8,
            packet_id: ids.next_id(),
            repeat: 0,
            transport,
            origin,
            target,
        };
        Packet { header, payload }
    }

    /// Serialize and obfuscate under `key`.
    pub fn encode(&self, key: &Key) -> Vec<u8> {
        debug_assert_eq!(self.header.command, self.payload.command());
        debug_assert_eq!(self.header.size as usize, self.payload.encoded_len());

        let mut plain = Vec::with_capacity(header::SIZE + self.payload.encoded_len() + crc::SIZE);
        plain.extend_from_slice(&self.header.encode());
        self.payload.encode(&mut plain);
        let checksum = crc::crc16(&plain);
        plain.extend_from_slice(&checksum.to_be_bytes());

        crypt::encrypt(&plain, key)
    }

    /// Decode an on-air frame under `key`.
    pub fn decode(data: &[u8], key: &Key) -> Result<Self, DecodeError> {
        if data.len() < MIN_WIRE_SIZE {
            return Err(DecodeError::TooSmall {
                min: MIN_WIRE_SIZE,
                size: data.len(),
            });
        }
        if data.len() > MAX_WIRE_SIZE {
            return Err(DecodeError::TooBig {
                max: MAX_WIRE_SIZE,
                size: data.len(),
            });
        }

        let plain = crypt::decrypt(data, key);
        if !crc::check(&plain) {
            return Err(DecodeError::CrcMismatch {
                expected: crc::extract(&plain),
                actual: crc::crc16(&plain[..plain.len() - crc::SIZE]),
            });
        }

        let header = Header::decode(&plain)?;
        let body = &plain[header::SIZE..plain.len() - crc::SIZE];
        if body.len() != header.size as usize {
            return Err(DecodeError::PayloadSize {
                expected: header.size as usize,
                actual: body.len(),
            });
        }

        let payload = Payload::decode(header.command, body)?;
        Ok(Packet { header, payload })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.header, self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Command, KEY_SIZE, ResetReason, StatusFlags};

    const KEY: Key = [0u8; KEY_SIZE];

    fn status_packet(ids: &PacketIdCounter) -> Packet {
        Packet::create(
            ids,
            TransportType::Unicast,
            0xEBAC0C42,
            0xDA1BA10B,
            Payload::Status {
                flags: StatusFlags::empty(),
                reset_reason: ResetReason::Wdg,
                reset_count: 8,
                cpu_temp: 5,
                bpm: 0x42,
                avg_bpm: 0x69,
            },
        )
    }

    #[test]
    fn round_trip() {
        let ids = PacketIdCounter::new();
        let packet = status_packet(&ids);
        let decoded = Packet::decode(&packet.encode(&KEY), &KEY).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn size_is_set_at_creation() {
        let ids = PacketIdCounter::new();
        let packet = status_packet(&ids);
        assert_eq!(packet.header.command, Command::Status);
        assert_eq!(packet.header.size, 6);
        assert_eq!(packet.header.repeat, 0);
    }

    #[test]
    fn packet_ids_increase_and_wrap() {
        let ids = PacketIdCounter::new();
        assert_eq!(ids.next_id(), 0);
        assert_eq!(ids.next_id(), 1);
        ids.0.store(u16::MAX, Ordering::Relaxed);
        assert_eq!(ids.next_id(), u16::MAX);
        assert_eq!(ids.next_id(), 0);
    }

    #[test]
    fn rejects_undersized_frames() {
        assert_eq!(
            Packet::decode(&[0u8; 17], &KEY),
            Err(DecodeError::TooSmall { min: 18, size: 17 })
        );
    }

    #[test]
    fn rejects_oversized_frames() {
        assert_eq!(
            Packet::decode(&[0u8; 65], &KEY),
            Err(DecodeError::TooBig { max: 64, size: 65 })
        );
    }

    #[test]
    fn rejects_corrupted_frames() {
        let ids = PacketIdCounter::new();
        let mut wire = status_packet(&ids).encode(&KEY);
        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        assert!(matches!(
            Packet::decode(&wire, &KEY),
            Err(DecodeError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn rejects_wrong_key() {
        let ids = PacketIdCounter::new();
        let wire = status_packet(&ids).encode(&KEY);
        let other: Key = [0x11; KEY_SIZE];
        assert!(Packet::decode(&wire, &other).is_err());
    }

    #[test]
    fn rejects_mismatching_declared_size() {
        // Hand-build a plaintext whose header claims a 2-byte payload but
        // carries one, then seal it the way encode() would.
        let header = Header {
            command: Command::Reject,
            size: 2,
            packet_id: 0,
            repeat: 0,
            transport: TransportType::Unicast,
            origin: 1,
            target: 2,
        };
        let mut plain = header.encode().to_vec();
        plain.push(0); // one byte of payload
        let checksum = crc::crc16(&plain);
        plain.extend_from_slice(&checksum.to_be_bytes());
        let wire = crypt::encrypt(&plain, &KEY);

        assert_eq!(
            Packet::decode(&wire, &KEY),
            Err(DecodeError::PayloadSize {
                expected: 2,
                actual: 1
            })
        );
    }
}
