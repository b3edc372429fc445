//! Integration tests driving the network state machine through the mock
//! radio, including a ciphertext vector captured from device firmware to
//! pin the on-air format bit-for-bit.

use lifemon_station::driver::mock::MockDriver;
use lifemon_station::net::Network;
use lifemon_station::packet::{Packet, PacketIdCounter};
use lifemon_station::payload::Payload;
use lifemon_station::store::{Device, MemoryStore, Store};
use lifemon_station::types::{
    AlertTrigger, Command, Key, ResetReason, StatusFlags, TransportType,
};
use lifemon_station::Config;

const STATION_MAC: u32 = 0xDEADBEEF;
const DEV_MAC: u32 = 0xEBAC0C42;

fn net_key() -> Key {
    Config::default().net_key
}

fn default_key() -> Key {
    Config::default().default_key
}

/// Helper to convert hex string to bytes
fn hex_to_bytes(hex: &str) -> Vec<u8> {
    hex.split_whitespace()
        .map(|s| u8::from_str_radix(s, 16).unwrap())
        .collect()
}

fn new_network() -> (Network<MockDriver, MemoryStore>, MockDriver, MemoryStore) {
    let mock = MockDriver::new();
    let store = MemoryStore::new();
    let net = Network::new(mock.clone(), store.clone(), &Config::default());
    (net, mock, store)
}

fn seed_device(store: &MemoryStore, mac: u32) {
    let mut handle = store.clone();
    handle
        .create_device(Device {
            mac,
            name: "Test".to_string(),
            version: "1.0.1.0".to_string(),
        })
        .unwrap();
}

fn register_frame(ids: &PacketIdCounter) -> Vec<u8> {
    Packet::create(
        ids,
        TransportType::Unicast,
        DEV_MAC,
        0x0,
        Payload::Register {
            hw_ver: 1,
            sw_ver_major: 2,
            sw_ver_minor: 3,
            sw_ver_patch: 4,
        },
    )
    .encode(&default_key())
}

fn ping_frame(ids: &PacketIdCounter) -> Vec<u8> {
    Packet::create(
        ids,
        TransportType::Unicast,
        DEV_MAC,
        STATION_MAC,
        Payload::Ping,
    )
    .encode(&net_key())
}

// ============================================================================
// Wire format
// ============================================================================

#[test]
fn deserialize_packet_from_device_firmware() {
    // 24-byte STATUS ciphertext captured from the wearable firmware,
    // obfuscated under the all-zero default key.
    let wire = hex_to_bytes("34 6a 6f 6c 6a 6a 6a 6a b4 c7 d4 85 6a 6a 6a 6a 6a 68 6e 95 03 28 1e cc");

    let ids = PacketIdCounter::new();
    let expected = Packet::create(
        &ids,
        TransportType::Unicast,
        0xDEADBEEF,
        0x0,
        Payload::Status {
            flags: StatusFlags::empty(),
            reset_reason: ResetReason::SwRst,
            reset_count: 4,
            cpu_temp: -1,
            bpm: 105,
            avg_bpm: 66,
        },
    );

    let packet = Packet::decode(&wire, &default_key()).unwrap();
    assert_eq!(packet, expected);
    assert_eq!(packet.header.packet_id, 0);
}

#[test]
fn status_round_trip_on_air() {
    let ids = PacketIdCounter::new();
    let packet = Packet::create(
        &ids,
        TransportType::Unicast,
        DEV_MAC,
        0xDA1BA10B,
        Payload::Status {
            flags: StatusFlags::empty(),
            reset_reason: ResetReason::Wdg,
            reset_count: 8,
            cpu_temp: 5,
            bpm: 0x42,
            avg_bpm: 0x69,
        },
    );

    let wire = packet.encode(&default_key());
    assert!(wire.len() >= 18 && wire.len() <= 64);
    assert_eq!(Packet::decode(&wire, &default_key()).unwrap(), packet);
}

#[test]
fn location_round_trip_on_air() {
    let ids = PacketIdCounter::new();
    let packet = Packet::create(
        &ids,
        TransportType::Unicast,
        DEV_MAC,
        STATION_MAC,
        Payload::Location {
            lat_dir: 'N',
            lat: "4943.97313".to_string(),
            long_dir: 'E',
            long: "02340.25276".to_string(),
        },
    );

    let wire = packet.encode(&net_key());
    assert_eq!(Packet::decode(&wire, &net_key()).unwrap(), packet);
}

#[test]
fn empty_payload_round_trip_on_air() {
    let ids = PacketIdCounter::new();
    let packet = Packet::create(
        &ids,
        TransportType::Unicast,
        DEV_MAC,
        0xDA1BA10B,
        Payload::Confirm,
    );

    let wire = packet.encode(&default_key());
    assert_eq!(wire.len(), 18);
    assert_eq!(Packet::decode(&wire, &default_key()).unwrap(), packet);
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn registration_happy_path() {
    let (mut net, mock, store) = new_network();
    let dev_ids = PacketIdCounter::new();

    mock.push_packet(register_frame(&dev_ids));
    mock.push_packet(ping_frame(&dev_ids));

    net.start_registration("Test", DEV_MAC);
    net.cycle();

    let device = store.device(DEV_MAC).unwrap().expect("device persisted");
    assert_eq!(device.name, "Test");
    assert_eq!(device.version, "1.2.3.4");

    // Handshake ends with a CONFIRM under the network key
    let confirm = Packet::decode(&mock.last_out_packet(), &net_key()).unwrap();
    assert_eq!(confirm.header.command, Command::Confirm);
    assert_eq!(confirm.header.origin, STATION_MAC);
    assert_eq!(confirm.header.target, DEV_MAC);
    assert_eq!(confirm.payload, Payload::Confirm);

    assert!(!net.registration_in_progress());
}

#[test]
fn registration_not_started_is_rejected() {
    let (mut net, mock, store) = new_network();
    let dev_ids = PacketIdCounter::new();

    mock.push_packet(register_frame(&dev_ids));
    net.cycle();

    assert!(store.device(DEV_MAC).unwrap().is_none());
    assert!(!net.registration_in_progress());

    let reject = Packet::decode(&mock.last_out_packet(), &default_key()).unwrap();
    assert_eq!(reject.header.command, Command::Reject);
    assert_eq!(reject.header.target, DEV_MAC);
    assert_eq!(reject.payload, Payload::Reject { reason: 0 });
}

#[test]
fn registration_mac_mismatch_is_rejected() {
    let (mut net, mock, store) = new_network();
    let dev_ids = PacketIdCounter::new();

    net.start_registration("Test", 0xEBAC0C43);
    mock.push_packet(register_frame(&dev_ids));
    net.cycle();

    assert!(store.device(DEV_MAC).unwrap().is_none());
    assert!(store.device(0xEBAC0C43).unwrap().is_none());
    // The armed slot survives a stray REGISTER from the wrong device
    assert!(net.registration_in_progress());

    let reject = Packet::decode(&mock.last_out_packet(), &default_key()).unwrap();
    assert_eq!(reject.header.command, Command::Reject);
}

#[test]
fn registration_without_ping_does_not_persist() {
    let (mut net, mock, store) = new_network();
    let dev_ids = PacketIdCounter::new();

    mock.push_packet(register_frame(&dev_ids));
    // No follow-up PING queued: the synchronous wait comes up empty

    net.start_registration("Test", DEV_MAC);
    net.cycle();

    assert!(store.device(DEV_MAC).unwrap().is_none());
    // Context stays armed and expires on a later cycle
    assert!(net.registration_in_progress());

    // The station did send REGISTRATION_DATA before the wait
    let reg_data = Packet::decode(&mock.last_out_packet(), &default_key()).unwrap();
    assert_eq!(reg_data.header.command, Command::RegistrationData);
    assert_eq!(
        reg_data.payload,
        Payload::RegistrationData {
            station_mac: STATION_MAC,
            net_key: net_key(),
        }
    );
}

#[test]
fn reregistration_replaces_existing_device() {
    let (mut net, mock, store) = new_network();
    let dev_ids = PacketIdCounter::new();

    seed_device(&store, DEV_MAC);
    let mut handle = store.clone();
    handle
        .append_status(lifemon_station::store::StatusRecord {
            device: DEV_MAC,
            timestamp: chrono::Utc::now(),
            flags: 0,
            bpm: 70,
            avg_bpm: 70,
        })
        .unwrap();

    mock.push_packet(register_frame(&dev_ids));
    mock.push_packet(ping_frame(&dev_ids));
    net.start_registration("Fresh", DEV_MAC);
    net.cycle();

    let device = store.device(DEV_MAC).unwrap().unwrap();
    assert_eq!(device.name, "Fresh");
    assert_eq!(device.version, "1.2.3.4");
    // Old telemetry went with the old row
    assert!(store.statuses().is_empty());
}

#[test]
fn registration_expires() {
    let mock = MockDriver::new();
    let store = MemoryStore::new();
    let mut config = Config::default();
    config.registration_duration_s = 0;
    let mut net = Network::new(mock.clone(), store.clone(), &config);

    net.start_registration("Test", DEV_MAC);
    assert!(net.registration_in_progress());

    net.cycle();
    assert!(!net.registration_in_progress());
}

// ============================================================================
// Liveness & telemetry
// ============================================================================

#[test]
fn ping_is_confirmed() {
    let (mut net, mock, store) = new_network();
    let dev_ids = PacketIdCounter::new();

    seed_device(&store, DEV_MAC);
    mock.push_packet(ping_frame(&dev_ids));
    net.cycle();

    let confirm = Packet::decode(&mock.last_out_packet(), &net_key()).unwrap();
    assert_eq!(confirm.header.command, Command::Confirm);
    assert_eq!(confirm.header.origin, STATION_MAC);
    assert_eq!(confirm.header.target, DEV_MAC);
    // First id the station's counter hands out
    assert_eq!(confirm.header.packet_id, 0);
}

#[test]
fn ping_for_another_node_is_ignored() {
    let (mut net, mock, _store) = new_network();
    let dev_ids = PacketIdCounter::new();

    let frame = Packet::create(
        &dev_ids,
        TransportType::Unicast,
        DEV_MAC,
        0xBADCAFE0,
        Payload::Ping,
    )
    .encode(&net_key());
    mock.push_packet(frame);
    net.cycle();

    assert!(mock.last_out_packet().is_empty());
}

#[test]
fn status_is_persisted() {
    let (mut net, mock, store) = new_network();
    let dev_ids = PacketIdCounter::new();

    seed_device(&store, DEV_MAC);
    let frame = Packet::create(
        &dev_ids,
        TransportType::Unicast,
        DEV_MAC,
        STATION_MAC,
        Payload::Status {
            flags: StatusFlags::empty(),
            reset_reason: ResetReason::Wdg,
            reset_count: 8,
            cpu_temp: 5,
            bpm: 0x42,
            avg_bpm: 0x69,
        },
    )
    .encode(&net_key());
    mock.push_packet(frame);
    net.cycle();

    let statuses = store.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].device, DEV_MAC);
    assert_eq!(statuses[0].flags, 0);
    assert_eq!(statuses[0].bpm, 0x42);
    assert_eq!(statuses[0].avg_bpm, 0x69);
    // Telemetry is never acknowledged
    assert!(mock.last_out_packet().is_empty());
}

#[test]
fn location_is_persisted_as_scaled_floats() {
    let (mut net, mock, store) = new_network();
    let dev_ids = PacketIdCounter::new();

    seed_device(&store, DEV_MAC);
    let frame = Packet::create(
        &dev_ids,
        TransportType::Unicast,
        DEV_MAC,
        STATION_MAC,
        Payload::Location {
            lat_dir: 'N',
            lat: "4943.97313".to_string(),
            long_dir: 'E',
            long: "02340.25276".to_string(),
        },
    )
    .encode(&net_key());
    mock.push_packet(frame);
    net.cycle();

    let locations = store.locations();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].latitude_direction, 'N');
    assert_eq!(locations[0].longitude_direction, 'E');
    assert!((locations[0].latitude - 49.4397313).abs() < 1e-9);
    assert!((locations[0].longitude - 23.4025276).abs() < 1e-9);
}

#[test]
fn alert_is_persisted() {
    let (mut net, mock, store) = new_network();
    let dev_ids = PacketIdCounter::new();

    seed_device(&store, DEV_MAC);
    let frame = Packet::create(
        &dev_ids,
        TransportType::Unicast,
        DEV_MAC,
        STATION_MAC,
        Payload::Alert {
            trigger: AlertTrigger::PulseThreshold,
        },
    )
    .encode(&net_key());
    mock.push_packet(frame);
    net.cycle();

    let alerts = store.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].device, DEV_MAC);
    assert_eq!(alerts[0].trigger, 1);
}

#[test]
fn telemetry_for_another_node_is_dropped() {
    let (mut net, mock, store) = new_network();
    let dev_ids = PacketIdCounter::new();

    seed_device(&store, DEV_MAC);
    let frame = Packet::create(
        &dev_ids,
        TransportType::Unicast,
        DEV_MAC,
        0xBADCAFE0,
        Payload::Status {
            flags: StatusFlags::empty(),
            reset_reason: ResetReason::Unk,
            reset_count: 0,
            cpu_temp: 20,
            bpm: 60,
            avg_bpm: 61,
        },
    )
    .encode(&net_key());
    mock.push_packet(frame);
    net.cycle();

    assert!(store.statuses().is_empty());
    assert!(mock.last_out_packet().is_empty());
}

#[test]
fn telemetry_from_unregistered_device_is_dropped() {
    let (mut net, mock, store) = new_network();
    let dev_ids = PacketIdCounter::new();

    let frame = Packet::create(
        &dev_ids,
        TransportType::Unicast,
        DEV_MAC,
        STATION_MAC,
        Payload::Alert {
            trigger: AlertTrigger::SuddenMovement,
        },
    )
    .encode(&net_key());
    mock.push_packet(frame);
    net.cycle();

    assert!(store.alerts().is_empty());
}

#[test]
fn garbage_frames_are_survivable() {
    let (mut net, mock, store) = new_network();

    mock.push_packet(vec![0u8; 30]);
    mock.push_packet(vec![0xFF; 5]);
    net.cycle();
    net.cycle();

    assert!(store.statuses().is_empty());
    assert!(mock.last_out_packet().is_empty());
}
