//! Station daemon: radio loop wiring and lifecycle.

use anyhow::{Context, anyhow};
use clap::Parser;
use lifemon_station::store::JsonStore;
use lifemon_station::{Config, Network, driver, station};
use log::info;
use std::path::PathBuf;
use std::thread;

/// Life-monitor ground station radio daemon.
#[derive(Debug, Parser)]
#[command(name = "station", version)]
struct Args {
    /// Station config file (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the radio driver ("mock" or "sx1278")
    #[arg(long)]
    driver: Option<String>,

    /// Override the store path
    #[arg(long)]
    db: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(driver) = args.driver {
        config.driver = driver;
    }
    if let Some(db) = args.db {
        config.db_path = db;
    }

    let driver = driver::create(&config)?;
    let store = JsonStore::open(&config.db_path)
        .with_context(|| format!("opening store {}", config.db_path.display()))?;
    let net = Network::new(driver, store, &config);

    // The sending half of the command queue belongs to the web server
    // collaborator; the daemon alone still ingests telemetry.
    let (command_tx, command_rx) = crossbeam_channel::bounded(16);
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("installing interrupt handler")?;

    let cycle_period = config.cycle_period();
    let radio = thread::Builder::new()
        .name("radio".to_string())
        .spawn(move || station::run(net, command_rx, shutdown_rx, cycle_period))
        .context("spawning radio thread")?;

    info!(
        "Station 0x{:X} up ({} driver)",
        config.station_mac, config.driver
    );

    radio
        .join()
        .map_err(|_| anyhow!("radio thread panicked"))?;
    drop(command_tx);
    Ok(())
}
