//! Command-specific packet payloads.
//!
//! One variant per [`Command`], each with a fixed bit-exact layout (all
//! multi-byte fields big-endian):
//!
//! | Command             | Layout                                            | Size |
//! |---------------------|---------------------------------------------------|------|
//! | PING                | empty                                             | 0    |
//! | CONFIRM             | empty                                             | 0    |
//! | REJECT              | `reason:u8`                                       | 1    |
//! | REGISTER            | `hw:u8, sw_maj:u8, sw_min:u8, sw_patch:u8`        | 4    |
//! | REGISTRATION_DATA   | `station_mac:u32, net_key:16B`                    | 20   |
//! | STATUS              | `flags:u8, reset:u8, count:u8, temp:i8, bpm:u8, avg:u8` | 6 |
//! | LOCATION            | `lat_dir:1B, lat:14B, long_dir:1B, long:14B` ASCII | 30  |
//! | ALERT               | `trigger:u8`                                      | 1    |
//!
//! LOCATION text fields are right-padded with NUL bytes to their fixed
//! width on encode and stripped of trailing NULs on decode. The NMEA
//! DDMM.mmmm values are carried verbatim; conversion to decimal degrees
//! belongs to the presentation layer.

use crate::DecodeError;
use crate::types::{AlertTrigger, Command, KEY_SIZE, Key, ResetReason, StatusFlags};
use std::fmt;

/// Width of a LOCATION direction field.
const DIR_SIZE: usize = 1;
/// Width of a LOCATION coordinate field.
const VAL_SIZE: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Ping,
    Confirm,
    Reject {
        reason: u8,
    },
    Register {
        hw_ver: u8,
        sw_ver_major: u8,
        sw_ver_minor: u8,
        sw_ver_patch: u8,
    },
    RegistrationData {
        station_mac: u32,
        net_key: Key,
    },
    Status {
        flags: StatusFlags,
        reset_reason: ResetReason,
        reset_count: u8,
        cpu_temp: i8,
        bpm: u8,
        avg_bpm: u8,
    },
    Location {
        lat_dir: char,
        lat: String,
        long_dir: char,
        long: String,
    },
    Alert {
        trigger: AlertTrigger,
    },
}

impl Payload {
    /// The command this payload variant belongs to.
    pub fn command(&self) -> Command {
        match self {
            Payload::Ping => Command::Ping,
            Payload::Confirm => Command::Confirm,
            Payload::Reject { .. } => Command::Reject,
            Payload::Register { .. } => Command::Register,
            Payload::RegistrationData { .. } => Command::RegistrationData,
            Payload::Status { .. } => Command::Status,
            Payload::Location { .. } => Command::Location,
            Payload::Alert { .. } => Command::Alert,
        }
    }

    /// Encoded length in bytes; fixed per variant.
    pub fn encoded_len(&self) -> usize {
        match self {
            Payload::Ping | Payload::Confirm => 0,
            Payload::Reject { .. } | Payload::Alert { .. } => 1,
            Payload::Register { .. } => 4,
            Payload::RegistrationData { .. } => 4 + KEY_SIZE,
            Payload::Status { .. } => 6,
            Payload::Location { .. } => (DIR_SIZE + VAL_SIZE) * 2,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Payload::Ping | Payload::Confirm => {}
            Payload::Reject { reason } => out.push(*reason),
            Payload::Register {
                hw_ver,
                sw_ver_major,
                sw_ver_minor,
                sw_ver_patch,
            } => {
                out.extend_from_slice(&[*hw_ver, *sw_ver_major, *sw_ver_minor, *sw_ver_patch]);
            }
            Payload::RegistrationData {
                station_mac,
                net_key,
            } => {
                out.extend_from_slice(&station_mac.to_be_bytes());
                out.extend_from_slice(net_key);
            }
            Payload::Status {
                flags,
                reset_reason,
                reset_count,
                cpu_temp,
                bpm,
                avg_bpm,
            } => {
                out.extend_from_slice(&[
                    flags.bits(),
                    *reset_reason as u8,
                    *reset_count,
                    *cpu_temp as u8,
                    *bpm,
                    *avg_bpm,
                ]);
            }
            Payload::Location {
                lat_dir,
                lat,
                long_dir,
                long,
            } => {
                encode_dir(out, *lat_dir);
                encode_coord(out, lat);
                encode_dir(out, *long_dir);
                encode_coord(out, long);
            }
            Payload::Alert { trigger } => out.push(*trigger as u8),
        }
    }

    /// Decode the payload for `command`, consuming exactly the bytes the
    /// command declares. Under- and over-length buffers are an error.
    pub fn decode(command: Command, data: &[u8]) -> Result<Self, DecodeError> {
        let expected = match command {
            Command::Ping | Command::Confirm => 0,
            Command::Reject | Command::Alert => 1,
            Command::Register => 4,
            Command::RegistrationData => 4 + KEY_SIZE,
            Command::Status => 6,
            Command::Location => (DIR_SIZE + VAL_SIZE) * 2,
        };
        if data.len() != expected {
            return Err(DecodeError::PayloadSize {
                expected,
                actual: data.len(),
            });
        }

        match command {
            Command::Ping => Ok(Payload::Ping),
            Command::Confirm => Ok(Payload::Confirm),
            Command::Reject => Ok(Payload::Reject { reason: data[0] }),
            Command::Register => Ok(Payload::Register {
                hw_ver: data[0],
                sw_ver_major: data[1],
                sw_ver_minor: data[2],
                sw_ver_patch: data[3],
            }),
            Command::RegistrationData => {
                let mut net_key = [0u8; KEY_SIZE];
                net_key.copy_from_slice(&data[4..]);
                Ok(Payload::RegistrationData {
                    station_mac: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
                    net_key,
                })
            }
            Command::Status => Ok(Payload::Status {
                flags: StatusFlags::from_bits_retain(data[0]),
                reset_reason: ResetReason::try_from(data[1])?,
                reset_count: data[2],
                cpu_temp: data[3] as i8,
                bpm: data[4],
                avg_bpm: data[5],
            }),
            Command::Location => {
                let lat_dir = decode_dir(data[0], "latitude direction")?;
                let lat = decode_coord(&data[DIR_SIZE..DIR_SIZE + VAL_SIZE], "latitude")?;
                let long_off = DIR_SIZE + VAL_SIZE;
                let long_dir = decode_dir(data[long_off], "longitude direction")?;
                let long = decode_coord(&data[long_off + DIR_SIZE..], "longitude")?;
                Ok(Payload::Location {
                    lat_dir,
                    lat,
                    long_dir,
                    long,
                })
            }
            Command::Alert => Ok(Payload::Alert {
                trigger: AlertTrigger::try_from(data[0])?,
            }),
        }
    }
}

fn encode_dir(out: &mut Vec<u8>, dir: char) {
    // A direction is a single ASCII letter (N/S/E/W in practice); anything
    // wider is clipped to its low byte like the firmware does.
    out.push(dir as u8);
}

fn encode_coord(out: &mut Vec<u8>, value: &str) {
    let bytes = value.as_bytes();
    let take = bytes.len().min(VAL_SIZE);
    out.extend_from_slice(&bytes[..take]);
    out.resize(out.len() + VAL_SIZE - take, 0);
}

fn decode_dir(byte: u8, field: &'static str) -> Result<char, DecodeError> {
    if byte.is_ascii() {
        Ok(byte as char)
    } else {
        Err(DecodeError::BadAscii(field))
    }
}

fn decode_coord(data: &[u8], field: &'static str) -> Result<String, DecodeError> {
    let text = std::str::from_utf8(data).map_err(|_| DecodeError::BadAscii(field))?;
    if !text.is_ascii() {
        return Err(DecodeError::BadAscii(field));
    }
    Ok(text.trim_end_matches('\0').to_string())
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Ping | Payload::Confirm => Ok(()),
            Payload::Reject { reason } => write!(f, "reason={reason}"),
            Payload::Register {
                hw_ver,
                sw_ver_major,
                sw_ver_minor,
                sw_ver_patch,
            } => write!(
                f,
                "ver={hw_ver}.{sw_ver_major}.{sw_ver_minor}.{sw_ver_patch}"
            ),
            Payload::RegistrationData { station_mac, .. } => {
                write!(f, "station_mac=0x{station_mac:X}")
            }
            Payload::Status {
                flags,
                reset_reason,
                reset_count,
                cpu_temp,
                bpm,
                avg_bpm,
            } => write!(
                f,
                "flags={} reset=({reset_reason} {reset_count}) cpu={cpu_temp} bpm=({bpm} {avg_bpm})",
                flags.bits()
            ),
            Payload::Location {
                lat_dir,
                lat,
                long_dir,
                long,
            } => write!(f, "{lat_dir} {lat} {long_dir} {long}"),
            Payload::Alert { trigger } => write!(f, "trigger={trigger}"),
        }
    }
}
