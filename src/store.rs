//! Persistence port for devices and telemetry.
//!
//! The network state machine only knows this trait; the storage engine
//! behind it is the host's business. Two implementations ship with the
//! station: [`MemoryStore`] for tests, and [`JsonStore`], a single
//! file-backed store the daemon uses by default.
//!
//! Every operation is best-effort from the radio loop's point of view:
//! failures are logged and the loop keeps going.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize: {0}")]
    Json(#[from] serde_json::Error),
}

/// A registered wearable. `mac` is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub mac: u32,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub device: u32,
    pub timestamp: DateTime<Utc>,
    pub flags: u8,
    pub bpm: u8,
    pub avg_bpm: u8,
}

/// Coordinates are the numeric value of the on-air NMEA field divided by
/// 100; the sign convention from the direction letters is left to the
/// viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub device: u32,
    pub timestamp: DateTime<Utc>,
    pub latitude_direction: char,
    pub latitude: f64,
    pub longitude_direction: char,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub device: u32,
    pub timestamp: DateTime<Utc>,
    pub trigger: u8,
}

pub trait Store: Send {
    fn device(&self, mac: u32) -> Result<Option<Device>, StoreError>;

    fn create_device(&mut self, device: Device) -> Result<(), StoreError>;

    /// Remove a device and all of its telemetry.
    fn delete_device(&mut self, mac: u32) -> Result<(), StoreError>;

    fn append_status(&mut self, record: StatusRecord) -> Result<(), StoreError>;

    fn append_location(&mut self, record: LocationRecord) -> Result<(), StoreError>;

    fn append_alert(&mut self, record: AlertRecord) -> Result<(), StoreError>;
}

/// Plain data behind both store implementations.
#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    devices: BTreeMap<u32, Device>,
    statuses: Vec<StatusRecord>,
    locations: Vec<LocationRecord>,
    alerts: Vec<AlertRecord>,
}

impl State {
    fn delete_device(&mut self, mac: u32) {
        self.devices.remove(&mac);
        self.statuses.retain(|record| record.device != mac);
        self.locations.retain(|record| record.device != mac);
        self.alerts.retain(|record| record.device != mac);
    }
}

/// In-memory store. Clones share state, so a test can hold a handle while
/// the network owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<StatusRecord> {
        self.state.lock().unwrap().statuses.clone()
    }

    pub fn locations(&self) -> Vec<LocationRecord> {
        self.state.lock().unwrap().locations.clone()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.state.lock().unwrap().alerts.clone()
    }
}

impl Store for MemoryStore {
    fn device(&self, mac: u32) -> Result<Option<Device>, StoreError> {
        Ok(self.state.lock().unwrap().devices.get(&mac).cloned())
    }

    fn create_device(&mut self, device: Device) -> Result<(), StoreError> {
        self.state.lock().unwrap().devices.insert(device.mac, device);
        Ok(())
    }

    fn delete_device(&mut self, mac: u32) -> Result<(), StoreError> {
        self.state.lock().unwrap().delete_device(mac);
        Ok(())
    }

    fn append_status(&mut self, record: StatusRecord) -> Result<(), StoreError> {
        self.state.lock().unwrap().statuses.push(record);
        Ok(())
    }

    fn append_location(&mut self, record: LocationRecord) -> Result<(), StoreError> {
        self.state.lock().unwrap().locations.push(record);
        Ok(())
    }

    fn append_alert(&mut self, record: AlertRecord) -> Result<(), StoreError> {
        self.state.lock().unwrap().alerts.push(record);
        Ok(())
    }
}

/// File-backed store: the whole state serialized as one JSON document,
/// rewritten on every mutation. Small fleets, small file; a station that
/// outgrows this swaps in another [`Store`] without touching the core.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    state: State,
}

impl JsonStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => State::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(JsonStore { path, state })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.state)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl Store for JsonStore {
    fn device(&self, mac: u32) -> Result<Option<Device>, StoreError> {
        Ok(self.state.devices.get(&mac).cloned())
    }

    fn create_device(&mut self, device: Device) -> Result<(), StoreError> {
        self.state.devices.insert(device.mac, device);
        self.persist()
    }

    fn delete_device(&mut self, mac: u32) -> Result<(), StoreError> {
        self.state.delete_device(mac);
        self.persist()
    }

    fn append_status(&mut self, record: StatusRecord) -> Result<(), StoreError> {
        self.state.statuses.push(record);
        self.persist()
    }

    fn append_location(&mut self, record: LocationRecord) -> Result<(), StoreError> {
        self.state.locations.push(record);
        self.persist()
    }

    fn append_alert(&mut self, record: AlertRecord) -> Result<(), StoreError> {
        self.state.alerts.push(record);
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(mac: u32) -> Device {
        Device {
            mac,
            name: "Test".into(),
            version: "1.0.1.0".into(),
        }
    }

    fn status(mac: u32) -> StatusRecord {
        StatusRecord {
            device: mac,
            timestamp: Utc::now(),
            flags: 0,
            bpm: 72,
            avg_bpm: 70,
        }
    }

    #[test]
    fn delete_cascades_to_telemetry() {
        let mut store = MemoryStore::new();
        store.create_device(device(0xEBAC0C42)).unwrap();
        store.create_device(device(0xEBAC0C43)).unwrap();
        store.append_status(status(0xEBAC0C42)).unwrap();
        store.append_status(status(0xEBAC0C43)).unwrap();

        store.delete_device(0xEBAC0C42).unwrap();

        assert!(store.device(0xEBAC0C42).unwrap().is_none());
        assert!(store.device(0xEBAC0C43).unwrap().is_some());
        let statuses = store.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].device, 0xEBAC0C43);
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = std::env::temp_dir().join("lifemon-store-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.json");
        let _ = std::fs::remove_file(&path);

        {
            let mut store = JsonStore::open(&path).unwrap();
            store.create_device(device(0xEBAC0C42)).unwrap();
            store.append_status(status(0xEBAC0C42)).unwrap();
        }

        let store = JsonStore::open(&path).unwrap();
        assert_eq!(
            store.device(0xEBAC0C42).unwrap(),
            Some(device(0xEBAC0C42))
        );

        std::fs::remove_file(&path).unwrap();
    }
}
