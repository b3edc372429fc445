//! Wire-level types shared by every layer of the radio core.

use crate::DecodeError;
use bitflags::bitflags;
use std::fmt;

/// Obfuscation key size in bytes.
pub const KEY_SIZE: usize = 16;

/// A 16-byte obfuscation key.
///
/// Two well-known keys exist per station: the *network key* shared with a
/// device after registration, and the *default key* used only during the
/// registration exchange. Both are immutable configuration.
pub type Key = [u8; KEY_SIZE];

/// Packet command, the first byte of every header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Ping = 0,
    Confirm = 1,
    Reject = 2,
    Register = 3,
    RegistrationData = 4,
    Status = 5,
    Location = 6,
    Alert = 7,
}

impl TryFrom<u8> for Command {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(Command::Ping),
            1 => Ok(Command::Confirm),
            2 => Ok(Command::Reject),
            3 => Ok(Command::Register),
            4 => Ok(Command::RegistrationData),
            5 => Ok(Command::Status),
            6 => Ok(Command::Location),
            7 => Ok(Command::Alert),
            other => Err(DecodeError::UnknownCommand(other)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Firmware log spelling
        let name = match self {
            Command::Ping => "PING",
            Command::Confirm => "CONFIRM",
            Command::Reject => "REJECT",
            Command::Register => "REGISTER",
            Command::RegistrationData => "REGISTRATION_DATA",
            Command::Status => "STATUS",
            Command::Location => "LOCATION",
            Command::Alert => "ALERT",
        };
        f.write_str(name)
    }
}

/// Transport mode carried on every packet.
///
/// Informational only: the state machine dispatches on origin and target,
/// never on this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransportType {
    Unicast = 0,
    Multicast = 1,
    Broadcast = 2,
}

impl TryFrom<u8> for TransportType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(TransportType::Unicast),
            1 => Ok(TransportType::Multicast),
            2 => Ok(TransportType::Broadcast),
            other => Err(DecodeError::UnknownTransport(other)),
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportType::Unicast => "UNICAST",
            TransportType::Multicast => "MULTICAST",
            TransportType::Broadcast => "BROADCAST",
        };
        f.write_str(name)
    }
}

/// Why a device last reset, reported in STATUS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResetReason {
    Unk = 0,
    HwRst = 1,
    SwRst = 2,
    Wdg = 3,
    Wwdg = 4,
    Por = 5,
    Bor = 6,
}

impl TryFrom<u8> for ResetReason {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(ResetReason::Unk),
            1 => Ok(ResetReason::HwRst),
            2 => Ok(ResetReason::SwRst),
            3 => Ok(ResetReason::Wdg),
            4 => Ok(ResetReason::Wwdg),
            5 => Ok(ResetReason::Por),
            6 => Ok(ResetReason::Bor),
            other => Err(DecodeError::InvalidValue {
                field: "reset reason",
                value: other,
            }),
        }
    }
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResetReason::Unk => "UNK",
            ResetReason::HwRst => "HW_RST",
            ResetReason::SwRst => "SW_RST",
            ResetReason::Wdg => "WDG",
            ResetReason::Wwdg => "WWDG",
            ResetReason::Por => "POR",
            ResetReason::Bor => "BOR",
        };
        f.write_str(name)
    }
}

/// What tripped an ALERT on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertTrigger {
    PulseThreshold = 1,
    SuddenMovement = 2,
}

impl TryFrom<u8> for AlertTrigger {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        match value {
            1 => Ok(AlertTrigger::PulseThreshold),
            2 => Ok(AlertTrigger::SuddenMovement),
            other => Err(DecodeError::InvalidValue {
                field: "alert trigger",
                value: other,
            }),
        }
    }
}

impl fmt::Display for AlertTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertTrigger::PulseThreshold => "PULSE_THRESHOLD",
            AlertTrigger::SuddenMovement => "SUDDEN_MOVEMENT",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Sensor health bitmask reported in STATUS.
    ///
    /// Unknown bits are preserved verbatim so newer firmware can report
    /// failures this station does not know about yet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const PULSE_SENSOR_FAILURE = 1 << 0;
        const ACCEL_SENSOR_FAILURE = 1 << 1;
        const GPS_FAILURE          = 1 << 2;
    }
}
