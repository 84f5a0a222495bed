//! The Storage Manager: drains its [`SharedBuffer`] reader position and
//! appends every measurement to a CSV file.
//!
//! Grounded on `open_db`/`insert_sensor`/`close_db` in the original's
//! `sensor_db.c`: truncate-on-open, one `"{id},{value},{timestamp}\n"`
//! line per record, best-effort continuation on a write failure (the
//! original logs and keeps going rather than tearing down the whole
//! gateway over one bad write).
//!
//! `{value}` is written with `Display`'s default (shortest
//! round-trippable) formatting rather than `%f`'s fixed six decimal
//! digits. Both satisfy "the file's default precision"; this crate
//! does not reproduce `%f`'s exact digit count, a deliberate divergence
//! (see DESIGN.md).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::buffer::{ReaderId, RemoveResult, SharedBuffer};
use crate::logger::EventLoggerHandle;

/// Open (creating or truncating) `path` and run the Storage Manager
/// loop until the buffer reports `End` for the [`ReaderId::Sm`]
/// position. Intended to run on its own thread.
pub fn run(buffer: Arc<SharedBuffer>, csv_path: &Path, logger: EventLoggerHandle) -> Result<()> {
    let mut file = open_csv(csv_path)?;
    logger.log("A new data.csv file has been created");

    loop {
        match buffer.remove(ReaderId::Sm) {
            RemoveResult::Measurement(m) => {
                if let Err(e) = write_record(&mut file, &m) {
                    logger.log(format!("Data insertion from sensor {} failed: {e}", m.sensor_id));
                } else {
                    logger.log(format!("Data insertion from sensor {} succeeded", m.sensor_id));
                }
            }
            RemoveResult::End => break,
        }
    }

    logger.log("The data.csv file has been closed");
    Ok(())
}

fn open_csv(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("open csv sink: {}", path.display()))
}

fn write_record(file: &mut File, m: &crate::measurement::Measurement) -> std::io::Result<()> {
    writeln!(file, "{},{},{}", m.sensor_id, m.value, m.timestamp)?;
    file.flush()
}
