//! Radio-thread runtime.
//!
//! The station runs two long-lived threads: the web collaborator's server
//! thread, and this radio loop. The only channel between them is the
//! command queue; the web side never touches the driver, the registration
//! context or the radio's persistence handle.
//!
//! Each iteration drains at most one queued command, runs one
//! [`Network::cycle`], then parks on the shutdown channel for the cycle
//! period. Parking on the channel rather than sleeping keeps shutdown
//! near-instant.

use crate::driver::Driver;
use crate::net::Network;
use crate::store::Store;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use log::info;
use std::time::Duration;

/// Commands the web side may enqueue for the radio thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationCommand {
    Register { name: String, mac: u32 },
}

/// Run the radio loop until `shutdown` fires or both channel peers hang up.
pub fn run<D: Driver, S: Store>(
    mut net: Network<D, S>,
    commands: Receiver<StationCommand>,
    shutdown: Receiver<()>,
    cycle_period: Duration,
) {
    info!("Radio loop started");

    loop {
        match shutdown.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        // Command drain precedes the cycle, so a registration issued from
        // the web UI takes effect on the very next listen
        match commands.try_recv() {
            Ok(StationCommand::Register { name, mac }) => net.start_registration(&name, mac),
            Err(TryRecvError::Empty) => {}
            // Web side gone; telemetry ingestion carries on regardless
            Err(TryRecvError::Disconnected) => {}
        }

        net.cycle();

        match shutdown.recv_timeout(cycle_period) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    info!("Radio loop stopped");
}
