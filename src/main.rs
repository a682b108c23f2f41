mod aggregator;
mod collector;
mod config;
mod console;
mod database;
mod error;
mod models;
mod permission;
mod scanning;
mod store;
mod upload;
mod utils;

use log::{error, info, warn};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::Duration;

use collector::{Collaborators, Collector, Intervals};
use config::CollectorConfig;
use database::PostgresDocumentSink;
use permission::ConfiguredPermission;
use scanning::{IioMagnetometer, NmcliScanner};
use store::FileStore;
use utils::format_datetime;

const COMMAND_QUEUE_SIZE: usize = 16;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match CollectorConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let state_file = config
        .state_file
        .clone()
        .or_else(FileStore::default_path)
        .ok_or("No state file location; set STATE_FILE")?;

    let sink = PostgresDocumentSink::new(config.database.clone());
    if let Err(e) = sink.prepare().await {
        // Uploads will report their own errors; scanning works without the database
        warn!("Could not prepare document table: {}", e);
    }

    let mut collector = Collector::new(
        Collaborators {
            permission: Box::new(ConfiguredPermission::new(config.location_permission.clone())),
            scanner: Arc::new(NmcliScanner::new(config.wifi_interface.clone())),
            sensor: Box::new(IioMagnetometer::new(config.magnetometer_device.clone())),
            sink: Box::new(sink),
            store: Box::new(FileStore::open(state_file)),
        },
        Intervals {
            wifi_scan: Duration::from_millis(config.wifi_scan_interval_ms),
            magnetometer: Duration::from_millis(config.magnetometer_interval_ms),
        },
    );
    collector.initialize().await;

    info!(
        "Room scan collector ready at {}",
        format_datetime(&OffsetDateTime::now_utc())
    );

    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
    tokio::spawn(console::read_commands(command_tx));

    // Run until quit or shutdown signal
    tokio::select! {
        _ = collector.run(command_rx) => {
            info!("Collector stopped");
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
