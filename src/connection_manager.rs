//! The Connection Manager: accepts sensor TCP sessions up to the
//! configured quota, spawns one reader thread per session, and inserts
//! each record it receives into the Shared Buffer.
//!
//! Grounded on `connmgr.c`: `connmgr_main`'s accept loop (bounded
//! `select()` wait on the listening socket, re-checked quota before and
//! after `accept()`) and `client_handler`'s per-field `select()` +
//! `tcp_receive` loop, which distinguishes a field-read timeout (ends
//! the session with a timeout event) from a clean peer close (ends the
//! session normally) and from a buffer insert failure (also ends the
//! session). The non-blocking-listener-plus-fixed-poll-interval shape
//! and the `std::thread::Builder` naming/logging idiom follow this
//! crate's established pattern for any thread that needs readable
//! diagnostics (see `src/logger.rs`, `src/storage.rs`).

use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::buffer::SharedBuffer;
use crate::conn_state::ConnState;
use crate::config::GatewayConfig;
use crate::constants::ACCEPT_POLL_INTERVAL_MS;
use crate::logger::EventLoggerHandle;
use crate::measurement::Measurement;

/// Run the accept loop until `max_conn` sessions have been served,
/// then wait for any still-active sessions to finish and close the
/// buffer. Intended to run on the main thread (it owns the listening
/// socket's lifetime) after the Storage and Data Manager threads have
/// started.
pub fn run(
    config: &GatewayConfig,
    buffer: Arc<SharedBuffer>,
    conn_state: Arc<ConnState>,
    logger: EventLoggerHandle,
) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .with_context(|| format!("bind listener on port {}", config.port))?;
    listener.set_nonblocking(true).context("set listener non-blocking")?;

    while !conn_state.quota_reached(config.max_conn) {
        let stream = match listener.accept() {
            Ok((stream, _addr)) => stream,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(ACCEPT_POLL_INTERVAL_MS));
                continue;
            }
            Err(e) => {
                logger.log(format!("accept failed: {e}"));
                continue;
            }
        };

        // Quota may have been met by sessions that finished while this
        // accept was pending; re-check and register under one lock
        // acquisition so a session can't complete in the gap between
        // the check and the increment (spec.md §4.2 step 2).
        if !conn_state.try_register_active(config.max_conn) {
            logger.log("max clients reached, refusing connection");
            drop(stream);
            continue;
        }

        spawn_session(stream, Arc::clone(&buffer), Arc::clone(&conn_state), config, logger.clone());
    }

    conn_state.wait_for_drain();
    buffer.close();
    Ok(())
}

fn spawn_session(
    stream: TcpStream,
    buffer: Arc<SharedBuffer>,
    conn_state: Arc<ConnState>,
    config: &GatewayConfig,
    logger: EventLoggerHandle,
) {
    let t_idle = config.t_idle;
    let completion_conn_state = Arc::clone(&conn_state);
    let spawned = thread::Builder::new().name("sensor-session".to_string()).spawn(move || {
        handle_session(stream, &buffer, t_idle, &logger);
        completion_conn_state.record_completion();
    });

    if let Err(e) = spawned {
        log::error!("failed to spawn session reader thread: {e}");
        conn_state.undo_active();
    }
}

fn handle_session(
    mut stream: TcpStream,
    buffer: &SharedBuffer,
    t_idle: Duration,
    logger: &EventLoggerHandle,
) {
    // REGISTERED: the sensor id carried by the session's first record
    // becomes its identity for logging from here on, per spec.md
    // §4.2. A session that never produces a record has no sensor id
    // to report and is identified by "unregistered" instead.
    let mut sensor_id: Option<u16> = None;

    loop {
        let stream_for_timeout = &stream;
        let set_timeout = move || stream_for_timeout.set_read_timeout(Some(t_idle));

        match Measurement::read_from(&mut stream, set_timeout) {
            Ok(Some(measurement)) => {
                if sensor_id.is_none() {
                    logger.log(format!(
                        "sensor {} has opened a new connection",
                        measurement.sensor_id
                    ));
                    sensor_id = Some(measurement.sensor_id);
                }

                if buffer.insert(measurement).is_err() {
                    logger.log(format!("sensor {}: buffer closed, ending session", id_tag(sensor_id)));
                    break;
                }
            }
            Ok(None) => {
                logger.log(format!("sensor {} closed the connection", id_tag(sensor_id)));
                break;
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                logger.log(format!("sensor {} timed out, ending session", id_tag(sensor_id)));
                break;
            }
            Err(e) => {
                logger.log(format!("sensor {}: read error, ending session: {e}", id_tag(sensor_id)));
                break;
            }
        }
    }
}

fn id_tag(sensor_id: Option<u16>) -> String {
    match sensor_id {
        Some(id) => id.to_string(),
        None => "unregistered".to_string(),
    }
}
