//! The Data Manager: drains its [`SharedBuffer`] reader position,
//! maintains a circular running-average window per sensor, and emits
//! "too cold"/"too hot" zone-change events through the event logger.
//!
//! Grounded on `datamgr.c`/`datamgr.h`: `datamgr_sensor_t`'s
//! `history`/`history_index`/`history_count`/`running_avg`/`last_com`
//! fields become [`SensorRecord`]'s circular buffer and `last_zone`;
//! the zone/event logic in `datamgr_thread` is reproduced exactly,
//! including the detail that `last_zone` updates even when the zone
//! returns to normal (see DESIGN.md's Open Question resolution).

use std::collections::HashMap;
use std::sync::Arc;

use crate::buffer::{ReaderId, RemoveResult, SharedBuffer};
use crate::logger::EventLoggerHandle;
use crate::sensor_map::SensorMap;

/// Per-sensor running-average state: a fixed-length circular window of
/// the most recent readings, the last timestamp seen, and the last
/// zone reported (for hysteresis-suppressed event emission).
#[derive(Debug, Clone)]
struct SensorRecord {
    history: Vec<f64>,
    write_index: usize,
    count: usize,
    last_ts: i64,
    last_zone: i8,
}

impl SensorRecord {
    fn new(window_len: usize) -> Self {
        Self {
            history: vec![0.0; window_len],
            write_index: 0,
            count: 0,
            last_ts: 0,
            last_zone: 0,
        }
    }

    fn push(&mut self, value: f64, ts: i64) {
        self.history[self.write_index] = value;
        self.write_index = (self.write_index + 1) % self.history.len();
        self.count = (self.count + 1).min(self.history.len());
        self.last_ts = ts;
    }

    /// `None` until the window has filled at least once, matching the
    /// original's "undefined until full" running average contract.
    fn running_avg(&self) -> Option<f64> {
        if self.count < self.history.len() {
            return None;
        }
        Some(self.history.iter().sum::<f64>() / self.history.len() as f64)
    }
}

fn zone(avg: f64, t_min: f64, t_max: f64) -> i8 {
    if avg < t_min {
        -1
    } else if avg > t_max {
        1
    } else {
        0
    }
}

/// All known sensors' running-average state, keyed by sensor id.
#[derive(Debug)]
pub struct SensorTable {
    window_len: usize,
    t_min: f64,
    t_max: f64,
    records: HashMap<u16, SensorRecord>,
}

impl SensorTable {
    pub fn new(window_len: usize, t_min: f64, t_max: f64) -> Self {
        Self { window_len, t_min, t_max, records: HashMap::new() }
    }

    /// Feed one measurement in. Returns `Some(zone)` only when a
    /// zone *change* away from or into a non-normal zone should be
    /// reported: `zone != last_zone && zone != 0`, exactly as the
    /// original's `if (comment != last_com) { if (comment != 0) {...}
    /// }` block. `last_zone` is updated unconditionally regardless of
    /// whether an event was emitted.
    fn observe(&mut self, sensor_id: u16, value: f64, ts: i64) -> Option<i8> {
        let record = self
            .records
            .entry(sensor_id)
            .or_insert_with(|| SensorRecord::new(self.window_len));
        record.push(value, ts);

        let Some(avg) = record.running_avg() else {
            return None;
        };

        let current_zone = zone(avg, self.t_min, self.t_max);
        let event = if current_zone != record.last_zone && current_zone != 0 {
            Some(current_zone)
        } else {
            None
        };
        record.last_zone = current_zone;
        event
    }

    #[cfg(test)]
    fn last_zone_of(&self, sensor_id: u16) -> Option<i8> {
        self.records.get(&sensor_id).map(|r| r.last_zone)
    }
}

/// Run the Data Manager loop until the buffer reports `End` for the
/// [`ReaderId::Dm`] position. Intended to run on its own thread.
pub fn run(
    buffer: Arc<SharedBuffer>,
    sensor_map: SensorMap,
    mut table: SensorTable,
    logger: EventLoggerHandle,
) {
    loop {
        match buffer.remove(ReaderId::Dm) {
            RemoveResult::Measurement(m) => {
                if !sensor_map.contains(m.sensor_id) {
                    logger.log(format!("received data from unknown sensor {}", m.sensor_id));
                    continue;
                }

                if let Some(zone) = table.observe(m.sensor_id, m.value, m.timestamp) {
                    let room = sensor_map.room_of(m.sensor_id);
                    let description = match zone {
                        -1 => "too cold",
                        1 => "too hot",
                        _ => unreachable!("observe only returns non-zero zones"),
                    };
                    logger.log(format!(
                        "sensor {} (room {:?}) reports it's {description} (running avg out of range)",
                        m.sensor_id, room
                    ));
                }
            }
            RemoveResult::End => break,
        }
    }

    logger.log("Data manager stopped");
}
