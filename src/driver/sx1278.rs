//! SX1278 LoRa transceiver driver over Linux SPI.
//!
//! Register-level driver for the Semtech SX1278 in LoRa mode, addressed
//! through `/dev/spidevB.C`. The station runs the link at 434 MHz, 125 kHz
//! bandwidth, SF7, CR 4/5, explicit header, hardware CRC on, and transmits
//! at the maximum +20 dBm (PA_BOOST with the high-power DAC) for range.
//!
//! Transmit and receive failures are latched into a last-error slot and
//! never propagate to the network loop; only `open` is fatal.

use super::Driver;
use log::trace;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

// LoRa-mode register map (SX1276/7/8 datasheet, table 41)
const REG_FIFO: u8 = 0x00;
const REG_OP_MODE: u8 = 0x01;
const REG_FRF_MSB: u8 = 0x06;
const REG_FRF_MID: u8 = 0x07;
const REG_FRF_LSB: u8 = 0x08;
const REG_PA_CONFIG: u8 = 0x09;
const REG_OCP: u8 = 0x0B;
const REG_LNA: u8 = 0x0C;
const REG_FIFO_ADDR_PTR: u8 = 0x0D;
const REG_FIFO_TX_BASE_ADDR: u8 = 0x0E;
const REG_FIFO_RX_BASE_ADDR: u8 = 0x0F;
const REG_FIFO_RX_CURRENT_ADDR: u8 = 0x10;
const REG_IRQ_FLAGS: u8 = 0x12;
const REG_RX_NB_BYTES: u8 = 0x13;
const REG_PAYLOAD_LENGTH: u8 = 0x22;
const REG_MODEM_CONFIG_1: u8 = 0x1D;
const REG_MODEM_CONFIG_2: u8 = 0x1E;
const REG_MODEM_CONFIG_3: u8 = 0x26;
const REG_VERSION: u8 = 0x42;
const REG_PA_DAC: u8 = 0x4D;

const MODE_LONG_RANGE: u8 = 0x80;
const MODE_SLEEP: u8 = 0x00;
const MODE_STDBY: u8 = 0x01;
const MODE_TX: u8 = 0x03;
const MODE_RX_CONTINUOUS: u8 = 0x05;

const IRQ_TX_DONE: u8 = 0x08;
const IRQ_PAYLOAD_CRC_ERROR: u8 = 0x20;
const IRQ_RX_DONE: u8 = 0x40;

const CHIP_VERSION: u8 = 0x12;
const SPI_CLOCK_HZ: u32 = 1_000_000;

// 434.0 MHz: Frf = f * 2^19 / 32 MHz
const FRF: [u8; 3] = [0x6C, 0x80, 0x00];

/// Max output power amplifier value in dBm.
const MAX_PA: i8 = 20;

const TX_DEADLINE: Duration = Duration::from_secs(2);
const POLL_STEP: Duration = Duration::from_millis(2);

#[derive(Debug, Error)]
pub enum Sx1278Error {
    #[error("bad spidev path {0:?}")]
    BadSpidev(String),

    #[error("spi: {0}")]
    Spi(#[from] rppal::spi::Error),

    #[error("unexpected chip version {0:#04x}")]
    BadChipVersion(u8),
}

pub struct Sx1278Driver {
    spi: Spi,
    last_error: String,
}

impl Sx1278Driver {
    /// Connect to the transceiver on `spidev` and bring it into standby,
    /// configured for the station's LoRa link at maximum output power.
    pub fn open(spidev: &str) -> Result<Self, Sx1278Error> {
        let (bus, slave) = parse_spidev(spidev)?;
        let spi = Spi::new(bus, slave, SPI_CLOCK_HZ, Mode::Mode0)?;
        let mut driver = Sx1278Driver {
            spi,
            last_error: String::new(),
        };

        let version = driver.read_register(REG_VERSION)?;
        if version != CHIP_VERSION {
            return Err(Sx1278Error::BadChipVersion(version));
        }

        // LoRa mode can only be entered from sleep
        driver.write_register(REG_OP_MODE, MODE_LONG_RANGE | MODE_SLEEP)?;
        driver.write_register(REG_FRF_MSB, FRF[0])?;
        driver.write_register(REG_FRF_MID, FRF[1])?;
        driver.write_register(REG_FRF_LSB, FRF[2])?;

        // 125 kHz, CR 4/5, explicit header; SF7 with payload CRC; AGC on
        driver.write_register(REG_MODEM_CONFIG_1, 0x72)?;
        driver.write_register(REG_MODEM_CONFIG_2, 0x74)?;
        driver.write_register(REG_MODEM_CONFIG_3, 0x04)?;

        // Max LNA gain, boost on
        driver.write_register(REG_LNA, 0x23)?;

        driver.write_register(REG_FIFO_TX_BASE_ADDR, 0x00)?;
        driver.write_register(REG_FIFO_RX_BASE_ADDR, 0x00)?;

        driver.set_power(MAX_PA)?;
        driver.write_register(REG_OP_MODE, MODE_LONG_RANGE | MODE_STDBY)?;

        Ok(driver)
    }

    fn set_power(&mut self, dbm: i8) -> Result<(), Sx1278Error> {
        // PA_BOOST pin; +20 dBm needs the high-power DAC and a raised
        // over-current limit (240 mA)
        if dbm >= 20 {
            self.write_register(REG_PA_CONFIG, 0x80 | 0x0F)?;
            self.write_register(REG_PA_DAC, 0x87)?;
            self.write_register(REG_OCP, 0x3B)?;
        } else {
            let level = dbm.clamp(2, 17) as u8 - 2;
            self.write_register(REG_PA_CONFIG, 0x80 | level)?;
            self.write_register(REG_PA_DAC, 0x84)?;
        }
        Ok(())
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, Sx1278Error> {
        let mut read = [0u8; 2];
        self.spi.transfer(&mut read, &[addr & 0x7F, 0])?;
        Ok(read[1])
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Sx1278Error> {
        self.spi.write(&[addr | 0x80, value])?;
        Ok(())
    }

    fn read_fifo(&mut self, len: usize) -> Result<Vec<u8>, Sx1278Error> {
        let write = vec![0u8; len + 1];
        let mut read = vec![0u8; len + 1];
        self.spi.transfer(&mut read, &write)?;
        Ok(read[1..].to_vec())
    }

    fn try_send(&mut self, data: &[u8]) -> Result<(), Sx1278Error> {
        self.write_register(REG_OP_MODE, MODE_LONG_RANGE | MODE_STDBY)?;
        self.write_register(REG_FIFO_ADDR_PTR, 0x00)?;

        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(REG_FIFO | 0x80);
        frame.extend_from_slice(data);
        self.spi.write(&frame)?;
        self.write_register(REG_PAYLOAD_LENGTH, data.len() as u8)?;

        self.write_register(REG_OP_MODE, MODE_LONG_RANGE | MODE_TX)?;
        let deadline = Instant::now() + TX_DEADLINE;
        loop {
            let flags = self.read_register(REG_IRQ_FLAGS)?;
            if flags & IRQ_TX_DONE != 0 {
                self.write_register(REG_IRQ_FLAGS, IRQ_TX_DONE)?;
                trace!("sx1278 tx done ({} bytes)", data.len());
                return Ok(());
            }
            if Instant::now() >= deadline {
                self.write_register(REG_OP_MODE, MODE_LONG_RANGE | MODE_STDBY)?;
                self.last_error = "tx done timeout".to_string();
                return Ok(());
            }
            thread::sleep(POLL_STEP);
        }
    }

    fn try_recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, Sx1278Error> {
        self.write_register(REG_OP_MODE, MODE_LONG_RANGE | MODE_RX_CONTINUOUS)?;
        let deadline = Instant::now() + timeout;
        loop {
            let flags = self.read_register(REG_IRQ_FLAGS)?;
            if flags & IRQ_RX_DONE != 0 {
                self.write_register(REG_IRQ_FLAGS, IRQ_RX_DONE | IRQ_PAYLOAD_CRC_ERROR)?;
                if flags & IRQ_PAYLOAD_CRC_ERROR != 0 {
                    self.last_error = "rx payload crc error".to_string();
                    return Ok(None);
                }

                let len = self.read_register(REG_RX_NB_BYTES)? as usize;
                let current = self.read_register(REG_FIFO_RX_CURRENT_ADDR)?;
                self.write_register(REG_FIFO_ADDR_PTR, current)?;
                let data = self.read_fifo(len)?;
                self.write_register(REG_OP_MODE, MODE_LONG_RANGE | MODE_STDBY)?;
                trace!("sx1278 rx done ({len} bytes)");
                return Ok(Some(data));
            }
            if Instant::now() >= deadline {
                self.write_register(REG_OP_MODE, MODE_LONG_RANGE | MODE_STDBY)?;
                return Ok(None);
            }
            thread::sleep(POLL_STEP);
        }
    }
}

impl Driver for Sx1278Driver {
    fn send(&mut self, data: &[u8]) {
        if let Err(err) = self.try_send(data) {
            self.last_error = err.to_string();
        }
    }

    fn recv(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        match self.try_recv(timeout) {
            Ok(data) => data,
            Err(err) => {
                self.last_error = err.to_string();
                None
            }
        }
    }

    fn last_error(&mut self) -> String {
        if self.last_error.is_empty() {
            "OK".to_string()
        } else {
            self.last_error.clone()
        }
    }
}

fn parse_spidev(path: &str) -> Result<(Bus, SlaveSelect), Sx1278Error> {
    let bad = || Sx1278Error::BadSpidev(path.to_string());

    let spec = path.strip_prefix("/dev/spidev").ok_or_else(bad)?;
    let (bus, slave) = spec.split_once('.').ok_or_else(bad)?;

    let bus = match bus {
        "0" => Bus::Spi0,
        "1" => Bus::Spi1,
        "2" => Bus::Spi2,
        _ => return Err(bad()),
    };
    let slave = match slave {
        "0" => SlaveSelect::Ss0,
        "1" => SlaveSelect::Ss1,
        "2" => SlaveSelect::Ss2,
        _ => return Err(bad()),
    };
    Ok((bus, slave))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spidev_paths_parse() {
        assert!(parse_spidev("/dev/spidev0.0").is_ok());
        assert!(parse_spidev("/dev/spidev1.2").is_ok());
        assert!(matches!(
            parse_spidev("/dev/ttyUSB0"),
            Err(Sx1278Error::BadSpidev(_))
        ));
        assert!(matches!(
            parse_spidev("/dev/spidev9.0"),
            Err(Sx1278Error::BadSpidev(_))
        ));
    }
}
