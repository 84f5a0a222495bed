//! The domain event logger.
//!
//! The original forked a dedicated logger process and piped
//! fixed-size `MSG_MAX`-byte records to it (`log_process_run`,
//! `logger_init`/`log_event` in `main.c`/`sensor_db.c`). A single
//! process has no reason to fork here, so the same shape is rendered
//! as an `mpsc` channel feeding one dedicated consumer thread, which is
//! the pattern this crate's ecosystem siblings use whenever one thread
//! needs to observe events produced by several others.
//!
//! Every event gets a monotonically increasing sequence number and a
//! wall-clock timestamp, and is appended as one line to the log file,
//! flushed immediately, matching the original's fixed-record,
//! write-then-flush discipline (just not the fixed-width encoding,
//! which only mattered for the original's fixed-size pipe reads).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::constants::MSG_MAX;

/// A single domain event. Messages longer than [`MSG_MAX`] bytes are
/// truncated at a char boundary before being written, matching the
/// original's fixed-size record budget.
#[derive(Debug, Clone)]
pub struct LogEvent {
    message: String,
}

impl LogEvent {
    /// Build an event, truncating `message` to fit [`MSG_MAX`] bytes.
    pub fn new(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.len() > MSG_MAX {
            let mut end = MSG_MAX;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        Self { message }
    }
}

/// A clonable handle used by any thread that wants to emit domain
/// events. Cloning and sending are cheap; the logger thread keeps
/// running until every handle (and the original sender) is dropped.
#[derive(Debug, Clone)]
pub struct EventLoggerHandle {
    tx: Sender<LogEvent>,
}

impl EventLoggerHandle {
    /// Record an event. Never blocks the caller on file I/O; the
    /// write happens on the logger's own thread. A send failure means
    /// the logger thread has already exited, which is only possible
    /// during shutdown after `join`, so it is logged and discarded
    /// rather than propagated.
    pub fn log(&self, message: impl Into<String>) {
        if self.tx.send(LogEvent::new(message)).is_err() {
            log::warn!("event logger thread is gone, dropping event");
        }
    }
}

/// Owns the logger thread. Dropping the last [`EventLoggerHandle`]
/// closes the channel, which lets [`EventLogger::join`] return once
/// the backlog has drained.
#[derive(Debug)]
pub struct EventLogger {
    handle: Option<JoinHandle<()>>,
}

impl EventLogger {
    /// Open `path` (creating or truncating it) and spawn the
    /// dedicated consumer thread. Returns the logger (for joining at
    /// shutdown) and a handle to give to producer threads.
    pub fn start(path: &Path) -> Result<(Self, EventLoggerHandle)> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("open event log: {}", path.display()))?;

        let (tx, rx) = mpsc::channel::<LogEvent>();
        let handle = thread::Builder::new()
            .name("event-logger".to_string())
            .spawn(move || run(file, rx))
            .context("spawn event logger thread")?;

        Ok((Self { handle: Some(handle) }, EventLoggerHandle { tx }))
    }

    /// Block until the logger thread has drained and exited. Only
    /// returns once every [`EventLoggerHandle`] has been dropped.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("event logger thread panicked");
            }
        }
    }
}

fn run(mut file: File, rx: mpsc::Receiver<LogEvent>) {
    let mut seq: u64 = 0;
    for event in rx {
        seq += 1;
        let line = format!("{} {} {}\n", seq, Utc::now().to_rfc3339(), event.message);
        if let Err(e) = file.write_all(line.as_bytes()) {
            log::error!("event logger write failed: {e}");
            continue;
        }
        if let Err(e) = file.flush() {
            log::error!("event logger flush failed: {e}");
        }
    }
}
