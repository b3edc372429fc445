//! Radio driver port.
//!
//! The network state machine talks to the radio through this trait only.
//! Two implementations exist: a FIFO-backed [`mock::MockDriver`] for tests
//! and development, and the SX1278 LoRa transceiver driver (compiled in
//! with the `sx1278` feature).

pub mod mock;
#[cfg(feature = "sx1278")]
pub mod sx1278;

use crate::config::{Config, ConfigError};
use log::info;
use std::time::Duration;

/// Half-duplex radio, byte-buffer in and out.
///
/// `send` is best-effort: transmit failures are absorbed into the driver's
/// last-error slot rather than surfaced to the caller. `recv` blocks for at
/// most `timeout` and returns `None` on timeout or failure.
pub trait Driver: Send {
    fn send(&mut self, data: &[u8]);

    fn recv(&mut self, timeout: Duration) -> Option<Vec<u8>>;

    /// The most recent failure, or `"OK"`.
    ///
    /// Whether reading drains the slot or merely peeks it is up to the
    /// implementation; callers that never read it cannot tell.
    fn last_error(&mut self) -> String;
}

impl Driver for Box<dyn Driver> {
    fn send(&mut self, data: &[u8]) {
        (**self).send(data)
    }

    fn recv(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        (**self).recv(timeout)
    }

    fn last_error(&mut self) -> String {
        (**self).last_error()
    }
}

/// Build the driver named by `config.driver`.
pub fn create(config: &Config) -> Result<Box<dyn Driver>, ConfigError> {
    match config.driver.as_str() {
        "mock" => {
            info!("Initializing MOCK radio driver");
            Ok(Box::new(mock::MockDriver::new()))
        }
        #[cfg(feature = "sx1278")]
        "sx1278" => {
            info!("Initializing SX1278 radio driver on {}", config.spidev);
            let driver = sx1278::Sx1278Driver::open(&config.spidev)
                .map_err(|err| ConfigError::DriverInit(err.to_string()))?;
            Ok(Box::new(driver))
        }
        #[cfg(not(feature = "sx1278"))]
        "sx1278" => Err(ConfigError::DriverInit(
            "sx1278 support not compiled in (enable the `sx1278` feature)".into(),
        )),
        other => Err(ConfigError::UnknownDriver(other.to_string())),
    }
}
