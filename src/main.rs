//! Entry point: parses CLI arguments, wires up the event logger, the
//! Shared Buffer, and the three worker components, then waits for the
//! gateway to finish serving its configured quota of sessions.
//!
//! Thread launch order (Storage Manager, then Data Manager, then the
//! Connection Manager's accept loop on the main thread) matches
//! `main.c`'s `main()`: both buffer consumers must already be blocked
//! waiting on the Shared Buffer before the first sensor session can be
//! accepted.

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;

use sensor_gateway::buffer::SharedBuffer;
use sensor_gateway::config::{CliArgs, GatewayConfig};
use sensor_gateway::conn_state::ConnState;
use sensor_gateway::data_manager::SensorTable;
use sensor_gateway::logger::{EventLogger, EventLoggerHandle};
use sensor_gateway::sensor_map::SensorMap;
use sensor_gateway::{connection_manager, data_manager, storage};

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();
    let config = GatewayConfig::from_cli(&args).context("building gateway configuration")?;

    let (logger, logger_handle) =
        EventLogger::start(&config.log_path).context("starting event logger")?;

    // `logger_handle` and every clone of it live entirely inside
    // `run_pipeline`; by the time it returns (Ok or Err) there is no
    // sender left anywhere, so `logger.join()` below is guaranteed to
    // drain and return rather than block forever.
    let pipeline_result = run_pipeline(&config, logger_handle);
    logger.join();
    pipeline_result
}

fn run_pipeline(config: &GatewayConfig, logger_handle: EventLoggerHandle) -> Result<()> {
    let sensor_map = SensorMap::load(&config.map_path).context("loading sensor map")?;
    let buffer = Arc::new(SharedBuffer::new());
    let conn_state = Arc::new(ConnState::new());

    let storage_buffer = Arc::clone(&buffer);
    let storage_csv_path = config.csv_path.clone();
    let storage_logger = logger_handle.clone();
    let storage_thread = thread::Builder::new()
        .name("storage-manager".to_string())
        .spawn(move || storage::run(storage_buffer, &storage_csv_path, storage_logger))
        .context("spawning storage manager thread")?;

    let data_buffer = Arc::clone(&buffer);
    let data_table = SensorTable::new(config.window_len, config.t_min, config.t_max);
    let data_logger = logger_handle.clone();
    let data_sensor_map = sensor_map.clone();
    let data_thread = thread::Builder::new()
        .name("data-manager".to_string())
        .spawn(move || data_manager::run(data_buffer, data_sensor_map, data_table, data_logger))
        .context("spawning data manager thread")?;

    let cm_result = connection_manager::run(
        config,
        Arc::clone(&buffer),
        Arc::clone(&conn_state),
        logger_handle.clone(),
    );
    drop(logger_handle);

    let data_join = data_thread.join();
    let storage_join = storage_thread.join().expect("storage manager thread panicked");
    data_join.expect("data manager thread panicked");

    cm_result.context("connection manager")?;
    storage_join.context("storage manager")?;
    Ok(())
}
