//! Station configuration.
//!
//! Loaded once at startup from an optional TOML file; every key has a
//! default so an empty file (or none at all) brings up a mock-driver
//! station. Keys are written as 32 hex characters:
//!
//! ```toml
//! station_mac = 0xDEADBEEF
//! net_key     = "0102030405060708090a0b0c0d0e0f10"
//! default_key = "00000000000000000000000000000000"
//! registration_duration_s = 10
//! listen_ms = 200
//! cycle_period_ms = 500
//! driver = "mock"            # or "sx1278"
//! db_path = "lifemon.json"
//! spidev = "/dev/spidev0.0"
//! ```

use crate::types::{KEY_SIZE, Key};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("bad key {0:?}: expected {n} hex characters", n = KEY_SIZE * 2)]
    BadKey(String),

    #[error("unknown radio driver {0:?}")]
    UnknownDriver(String),

    #[error("driver init: {0}")]
    DriverInit(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// This node's MAC on the radio network.
    pub station_mac: u32,
    /// Post-registration obfuscation key shared with devices.
    #[serde(deserialize_with = "key_from_hex")]
    pub net_key: Key,
    /// Key used only for the REGISTER / REGISTRATION_DATA exchange.
    #[serde(deserialize_with = "key_from_hex")]
    pub default_key: Key,
    /// How long a pending registration stays valid.
    pub registration_duration_s: u64,
    /// Per-recv radio timeout.
    pub listen_ms: u64,
    /// Post-cycle wait of the radio loop.
    pub cycle_period_ms: u64,
    /// "mock" or "sx1278".
    pub driver: String,
    pub db_path: PathBuf,
    /// SPI device of the SX1278 transceiver.
    pub spidev: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            station_mac: 0xDEADBEEF,
            // Firmware bring-up key; override for real deployments
            net_key: [
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D,
                0x0E, 0x0F, 0x10,
            ],
            default_key: [0u8; KEY_SIZE],
            registration_duration_s: 10,
            listen_ms: 200,
            cycle_period_ms: 500,
            driver: "mock".to_string(),
            db_path: PathBuf::from("lifemon.json"),
            spidev: "/dev/spidev0.0".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn listen(&self) -> Duration {
        Duration::from_millis(self.listen_ms)
    }

    pub fn cycle_period(&self) -> Duration {
        Duration::from_millis(self.cycle_period_ms)
    }

    pub fn registration_duration(&self) -> Duration {
        Duration::from_secs(self.registration_duration_s)
    }
}

/// Parse a key written as 32 hex characters.
pub fn parse_key(text: &str) -> Result<Key, ConfigError> {
    let bad = || ConfigError::BadKey(text.to_string());

    if text.len() != KEY_SIZE * 2 {
        return Err(bad());
    }
    let mut key = [0u8; KEY_SIZE];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&text[i * 2..i * 2 + 2], 16).map_err(|_| bad())?;
    }
    Ok(key)
}

fn key_from_hex<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Key, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_key(&text).map_err(serde::de::Error::custom)
}
