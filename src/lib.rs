//! Ground station radio core for a wearable life-monitor network.
//!
//! A fleet of battery-powered wearables periodically broadcasts heart-rate,
//! GPS position and alerts over a short-range half-duplex radio link. This
//! crate implements the station side of that link: the on-air packet format
//! (framing, obfuscation, CRC integrity), the payload type system, and the
//! single-station state machine that drives device registration and
//! telemetry ingestion.
//!
//! # On-air frame
//!
//! ```text
//! salt0 | salt1 | ENC( header(14) | payload(0..48) | crc(2) )
//! ```
//!
//! Every multi-byte integer on the wire is big-endian. The whole plaintext
//! packet (header, payload and trailing CRC-16) is obfuscated with a salted
//! XOR keyed by a 16-byte key; the two salt bytes are sent in the clear.
//! Frames are between 18 and 64 bytes on air.
//!
//! The XOR scheme is deliberately not cryptography. It breaks repeated
//! plaintext patterns on air and separates the default-key registration
//! exchange from steady-state traffic; the only integrity mechanism is the
//! CRC, and the wire must be treated as untrusted.
//!
//! # Usage
//! ```ignore
//! use lifemon_station::{Config, Network, driver, store::JsonStore};
//!
//! let config = Config::default();
//! let driver = driver::create(&config)?;
//! let store = JsonStore::open(&config.db_path)?;
//! let mut net = Network::new(driver, store, &config);
//!
//! loop {
//!     net.cycle();
//! }
//! ```

pub mod config;
pub mod crc;
pub mod crypt;
pub mod driver;
pub mod header;
pub mod net;
pub mod packet;
pub mod payload;
pub mod station;
pub mod store;
pub mod types;

pub use config::{Config, ConfigError};
pub use driver::Driver;
pub use header::Header;
pub use net::Network;
pub use packet::{Packet, PacketIdCounter};
pub use payload::Payload;
pub use station::StationCommand;
pub use store::Store;
pub use types::{Command, KEY_SIZE, Key, TransportType};

use thiserror::Error;

/// Errors produced while decoding an on-air frame.
///
/// All of these are non-fatal to the station: the network loop logs the
/// failure and keeps listening.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("packet too small (min={min} size={size})")]
    TooSmall { min: usize, size: usize },

    #[error("packet too big (max={max} size={size})")]
    TooBig { max: usize, size: usize },

    #[error("CRC not matching (expected={expected:#06x} actual={actual:#06x})")]
    CrcMismatch { expected: u16, actual: u16 },

    #[error("unknown command {0}")]
    UnknownCommand(u8),

    #[error("unknown transport type {0}")]
    UnknownTransport(u8),

    #[error("mismatching payload size (expected={expected} actual={actual})")]
    PayloadSize { expected: usize, actual: usize },

    #[error("invalid {field} value {value}")]
    InvalidValue { field: &'static str, value: u8 },

    #[error("non-ascii text in {0} field")]
    BadAscii(&'static str),
}
