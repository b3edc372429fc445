//! Single-station network state machine.
//!
//! The [`Network`] owns the radio driver, the persistence port, both
//! obfuscation keys and the one-slot registration context. One call to
//! [`Network::cycle`] is one tick of the radio loop: listen once, dispatch
//! whatever arrived, expire a stale registration.
//!
//! # Registration flow
//!
//! ```text
//! device                station
//!   | REGISTER  (defK)   |
//!   |------------------->|  (context matches)
//!   | REGISTRATION_DATA  |
//!   |<-------------------|  (defK; carries station_mac & net_key)
//!   | PING (netK)        |
//!   |------------------->|  (synchronous wait, one listen)
//!   | CONFIRM (netK)     |
//!   |<-------------------|  device persisted; context cleared
//! ```
//!
//! If the synchronous PING wait comes up empty the device is not
//! persisted; the context is left in place and expires on a later cycle.
//! The station never retransmits REGISTRATION_DATA.
//!
//! `cycle()` never propagates an error: decode, state, driver and
//! persistence failures are all logged and the machine moves on.

use crate::config::Config;
use crate::driver::Driver;
use crate::packet::{Packet, PacketIdCounter};
use crate::payload::Payload;
use crate::store::{AlertRecord, Device, LocationRecord, StatusRecord, Store};
use crate::types::{Command, Key, TransportType};
use chrono::Utc;
use log::{error, info, warn};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Registration-protocol violations; logged, never propagated.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("received registration from 0x{0:X}, but no registration is in progress")]
    NotInProgress(u32),

    #[error("mismatching registration device MACs: 0x{expected:X} != 0x{actual:X}")]
    MacMismatch { expected: u32, actual: u32 },

    #[error("failed to register 0x{0:X}, no response")]
    NoPing(u32),
}

/// One-slot record of an in-flight registration attempt.
///
/// `dev_mac == 0` is the idle sentinel; MAC 0 is reserved on the network.
#[derive(Debug, Clone)]
pub struct RegistrationContext {
    name: String,
    dev_mac: u32,
    duration: Duration,
    start: Instant,
}

impl RegistrationContext {
    fn idle() -> Self {
        RegistrationContext {
            name: String::new(),
            dev_mac: 0,
            duration: Duration::ZERO,
            start: Instant::now(),
        }
    }

    fn in_progress(&self) -> bool {
        self.dev_mac != 0
    }

    fn expired(&self) -> bool {
        self.start.elapsed() >= self.duration
    }
}

pub struct Network<D: Driver, S: Store> {
    driver: D,
    store: S,
    station_mac: u32,
    net_key: Key,
    default_key: Key,
    listen: Duration,
    registration_duration: Duration,
    registration: RegistrationContext,
    packet_ids: PacketIdCounter,
}

impl<D: Driver, S: Store> Network<D, S> {
    pub fn new(driver: D, store: S, config: &Config) -> Self {
        Network {
            driver,
            store,
            station_mac: config.station_mac,
            net_key: config.net_key,
            default_key: config.default_key,
            listen: config.listen(),
            registration_duration: config.registration_duration(),
            registration: RegistrationContext::idle(),
            packet_ids: PacketIdCounter::new(),
        }
    }

    /// Arm the registration slot for `dev_mac`, replacing whatever was
    /// there. Commands are consumed on the radio thread, so no guard is
    /// needed against a concurrent `cycle`.
    pub fn start_registration(&mut self, name: &str, dev_mac: u32) {
        info!(
            "Starting registration for {name:?} (0x{dev_mac:X}) for {}s",
            self.registration_duration.as_secs()
        );
        self.registration = RegistrationContext {
            name: name.to_string(),
            dev_mac,
            duration: self.registration_duration,
            start: Instant::now(),
        };
    }

    /// Whether a registration attempt is currently armed.
    pub fn registration_in_progress(&self) -> bool {
        self.registration.in_progress()
    }

    /// One tick of the radio loop: listen once, dispatch, expire.
    pub fn cycle(&mut self) {
        if let Some((packet, key)) = self.recv_packet(self.listen) {
            self.handle_packet(packet, key);
        }

        if self.registration.in_progress() && self.registration.expired() {
            error!("Registration for 0x{:X} expired", self.registration.dev_mac);
            self.registration = RegistrationContext::idle();
        }
    }

    /// Listen once and try both keys, network key first: steady-state
    /// traffic uses it, only the registration exchange runs on the default
    /// key. The CRC sits inside the cipher, so a wrong key almost always
    /// fails there and the retry is cheap.
    fn recv_packet(&mut self, timeout: Duration) -> Option<(Packet, Key)> {
        let data = self.driver.recv(timeout)?;

        match Packet::decode(&data, &self.net_key) {
            Ok(packet) => Some((packet, self.net_key)),
            Err(net_err) => match Packet::decode(&data, &self.default_key) {
                Ok(packet) => Some((packet, self.default_key)),
                Err(default_err) => {
                    error!("Failed to parse packet: {net_err}; {default_err}");
                    None
                }
            },
        }
    }

    fn handle_packet(&mut self, packet: Packet, key: Key) {
        match packet.header.command {
            Command::Ping => self.handle_ping(&packet, &key),
            Command::Register => {
                if let Err(err) = self.handle_registration(&packet, &key) {
                    match err {
                        StateError::NotInProgress(_) => warn!("{err}, rejecting..."),
                        _ => error!("{err}"),
                    }
                }
            }
            Command::Status => self.handle_status(&packet),
            Command::Location => self.handle_location(&packet),
            Command::Alert => self.handle_alert(&packet),
            Command::Confirm | Command::RegistrationData | Command::Reject => {
                // The station never initiates registration, so none of
                // these are expected in steady state.
                warn!(
                    "Unexpected command: {} ({}) from 0x{:X}",
                    packet.header.command, packet.header.command as u8, packet.header.origin
                );
            }
        }
    }

    fn handle_ping(&mut self, packet: &Packet, key: &Key) {
        if packet.header.target != self.station_mac {
            warn!(
                "PING addressed to another node (0x{:X}), ignoring...",
                packet.header.target
            );
            return;
        }

        self.send_confirm(packet.header.origin, key);
        info!("Received PING from 0x{:X}", packet.header.origin);
    }

    fn handle_registration(&mut self, packet: &Packet, key: &Key) -> Result<(), StateError> {
        let dev_mac = packet.header.origin;

        if !self.registration.in_progress() {
            self.send_reject(dev_mac, key);
            return Err(StateError::NotInProgress(dev_mac));
        }

        if dev_mac != self.registration.dev_mac {
            self.send_reject(dev_mac, key);
            return Err(StateError::MacMismatch {
                expected: self.registration.dev_mac,
                actual: dev_mac,
            });
        }

        let Payload::Register {
            hw_ver,
            sw_ver_major,
            sw_ver_minor,
            sw_ver_patch,
        } = packet.payload
        else {
            // decode ties payload variant to command
            return Ok(());
        };

        // A re-registering device starts from a clean slate
        match self.store.device(dev_mac) {
            Ok(Some(_)) => {
                warn!("Device 0x{dev_mac:X} already registered");
                if let Err(err) = self.store.delete_device(dev_mac) {
                    error!("Failed to remove stale device 0x{dev_mac:X}: {err}");
                }
            }
            Ok(None) => {}
            Err(err) => error!("Failed to look up device 0x{dev_mac:X}: {err}"),
        }

        let reg_data = Packet::create(
            &self.packet_ids,
            TransportType::Unicast,
            self.station_mac,
            dev_mac,
            Payload::RegistrationData {
                station_mac: self.station_mac,
                net_key: self.net_key,
            },
        );
        self.send(&reg_data, key);

        // The device answers with a PING under its new key; one listen,
        // no retransmission from our side.
        let ping = self.recv_packet(self.listen);
        match ping {
            Some((ping, ping_key))
                if ping.header.command == Command::Ping
                    && ping.header.origin == dev_mac
                    && ping.header.target == self.station_mac
                    && ping_key == self.net_key =>
            {
                self.handle_ping(&ping, &ping_key);

                let device = Device {
                    mac: dev_mac,
                    name: self.registration.name.clone(),
                    version: format!("{hw_ver}.{sw_ver_major}.{sw_ver_minor}.{sw_ver_patch}"),
                };
                match self.store.create_device(device) {
                    Ok(()) => {
                        info!("Registered 0x{dev_mac:X}");
                        self.registration = RegistrationContext::idle();
                    }
                    Err(err) => error!("Failed to save device 0x{dev_mac:X}: {err}"),
                }
                Ok(())
            }
            _ => Err(StateError::NoPing(dev_mac)),
        }
    }

    fn handle_status(&mut self, packet: &Packet) {
        let Some(device) = self.check_telemetry(packet) else {
            return;
        };
        let Payload::Status {
            flags,
            bpm,
            avg_bpm,
            ..
        } = packet.payload
        else {
            return;
        };

        let record = StatusRecord {
            device,
            timestamp: Utc::now(),
            flags: flags.bits(),
            bpm,
            avg_bpm,
        };
        match self.store.append_status(record) {
            Ok(()) => info!("Received STATUS from 0x{device:X}: {}", packet.payload),
            Err(err) => error!("Failed to save STATUS data from 0x{device:X}: {err}"),
        }
    }

    fn handle_location(&mut self, packet: &Packet) {
        let Some(device) = self.check_telemetry(packet) else {
            return;
        };
        let Payload::Location {
            lat_dir,
            ref lat,
            long_dir,
            ref long,
        } = packet.payload
        else {
            return;
        };

        // NMEA DDMM.mmmm over 100; decimal-degree conversion is the
        // viewer's job
        let (Ok(latitude), Ok(longitude)) = (lat.parse::<f64>(), long.parse::<f64>()) else {
            error!(
                "Failed to save LOCATION data from 0x{device:X}: non-numeric coordinates {:?} {:?}",
                lat, long
            );
            return;
        };

        let record = LocationRecord {
            device,
            timestamp: Utc::now(),
            latitude_direction: lat_dir,
            latitude: latitude / 100.0,
            longitude_direction: long_dir,
            longitude: longitude / 100.0,
        };
        match self.store.append_location(record) {
            Ok(()) => info!("Received LOCATION from 0x{device:X}: {}", packet.payload),
            Err(err) => error!("Failed to save LOCATION data from 0x{device:X}: {err}"),
        }
    }

    fn handle_alert(&mut self, packet: &Packet) {
        let Some(device) = self.check_telemetry(packet) else {
            return;
        };
        let Payload::Alert { trigger } = packet.payload else {
            return;
        };

        let record = AlertRecord {
            device,
            timestamp: Utc::now(),
            trigger: trigger as u8,
        };
        match self.store.append_alert(record) {
            Ok(()) => info!("Received ALERT from 0x{device:X}: {}", packet.payload),
            Err(err) => error!("Failed to save ALERT data from 0x{device:X}: {err}"),
        }
    }

    /// Addressing and device-row checks shared by the telemetry commands.
    /// Telemetry is never acknowledged.
    fn check_telemetry(&mut self, packet: &Packet) -> Option<u32> {
        let origin = packet.header.origin;

        if packet.header.target != self.station_mac {
            warn!(
                "{} addressed to another node (0x{:X}), ignoring...",
                packet.header.command, packet.header.target
            );
            return None;
        }

        match self.store.device(origin) {
            Ok(Some(_)) => Some(origin),
            Ok(None) => {
                warn!(
                    "{} from unregistered device 0x{origin:X}, ignoring...",
                    packet.header.command
                );
                None
            }
            Err(err) => {
                error!("Failed to look up device 0x{origin:X}: {err}");
                None
            }
        }
    }

    fn send_confirm(&mut self, dev_mac: u32, key: &Key) {
        let packet = Packet::create(
            &self.packet_ids,
            TransportType::Unicast,
            self.station_mac,
            dev_mac,
            Payload::Confirm,
        );
        self.send(&packet, key);
    }

    fn send_reject(&mut self, dev_mac: u32, key: &Key) {
        let packet = Packet::create(
            &self.packet_ids,
            TransportType::Unicast,
            self.station_mac,
            dev_mac,
            Payload::Reject { reason: 0 },
        );
        self.send(&packet, key);
    }

    fn send(&mut self, packet: &Packet, key: &Key) {
        // Best-effort: transmit failures stay in the driver's last-error slot
        self.driver.send(&packet.encode(key));
    }
}
