//! Sensor-to-room map loader.
//!
//! Whitespace-separated `room_id sensor_id` pairs, both `u16`, one pair
//! per line. Direct rendering of `load_map` in the original's
//! `datamgr.c`: parsing stops at the first line that doesn't yield two
//! numbers (including a clean EOF) without treating that as an error —
//! a sensor map is allowed to simply end.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// `sensor_id -> room_id`, loaded once and thereafter immutable.
#[derive(Debug, Clone, Default)]
pub struct SensorMap {
    room_by_sensor: HashMap<u16, u16>,
}

impl SensorMap {
    /// Load the map from `path`. Returns an error only if the file
    /// cannot be opened; a malformed or empty file yields whatever
    /// pairs were parsed before the first failure (possibly none).
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("open sensor map: {}", path.display()))?;

        let mut room_by_sensor = HashMap::new();
        for line in contents.lines() {
            let mut fields = line.split_whitespace();
            let room = match fields.next().and_then(|s| s.parse::<u16>().ok()) {
                Some(v) => v,
                None => break,
            };
            let sensor_id = match fields.next().and_then(|s| s.parse::<u16>().ok()) {
                Some(v) => v,
                None => break,
            };
            room_by_sensor.insert(sensor_id, room);
        }

        Ok(Self { room_by_sensor })
    }

    /// Room id for `sensor_id`, if known.
    pub fn room_of(&self, sensor_id: u16) -> Option<u16> {
        self.room_by_sensor.get(&sensor_id).copied()
    }

    /// All known sensor ids.
    pub fn sensor_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.room_by_sensor.keys().copied()
    }

    /// True if `sensor_id` is present in the map.
    pub fn contains(&self, sensor_id: u16) -> bool {
        self.room_by_sensor.contains_key(&sensor_id)
    }
}
