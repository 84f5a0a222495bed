//! CLI parsing and runtime configuration.
//!
//! The gateway takes exactly two positional arguments (`port`,
//! `max_conn`); everything else the original exposed only through
//! `config.h` compile-time constants is collected into
//! [`GatewayConfig`], which loads its defaults from
//! [`crate::constants`] and accepts environment-variable overrides —
//! the same `apply_env_overrides` shape the rest of this crate's
//! ecosystem siblings use for optional tuning knobs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use crate::constants::{
    DEFAULT_CSV_PATH, DEFAULT_LOG_PATH, DEFAULT_MAP_PATH, DEFAULT_T_IDLE_SECS, DEFAULT_T_MAX,
    DEFAULT_T_MIN, DEFAULT_WINDOW_LEN, MAX_CONN_RANGE, PORT_RANGE,
};

/// `sensor_gateway <port> <max_conn>` — both positive integers, `port`
/// in 1..65535 and `max_conn` in 1..1_000_000. Non-conforming
/// arguments print usage to stderr and exit non-zero (handled by
/// `clap` itself via the custom `value_parser`s below).
#[derive(Debug, Parser)]
#[command(
    name = "sensor-gateway",
    about = "Accept sensor TCP sessions, fan out measurements to a data manager and a storage manager"
)]
pub struct CliArgs {
    /// TCP port to listen on.
    #[arg(value_parser = parse_port)]
    pub port: u16,

    /// Number of sensor sessions to serve before shutting down.
    #[arg(value_parser = parse_max_conn)]
    pub max_conn: u32,
}

fn parse_port(s: &str) -> Result<u16, String> {
    let value: u32 = s.parse().map_err(|_| format!("invalid port: {s}"))?;
    if !PORT_RANGE.contains(&value) {
        return Err(format!(
            "port must be in {}..={}: {s}",
            PORT_RANGE.start(),
            PORT_RANGE.end()
        ));
    }
    Ok(value as u16)
}

fn parse_max_conn(s: &str) -> Result<u32, String> {
    let value: u32 = s.parse().map_err(|_| format!("invalid max_conn: {s}"))?;
    if !MAX_CONN_RANGE.contains(&value) {
        return Err(format!(
            "max_conn must be in {}..={}: {s}",
            MAX_CONN_RANGE.start(),
            MAX_CONN_RANGE.end()
        ));
    }
    Ok(value)
}

/// Runtime-tunable parameters that the original fixed at compile time.
///
/// All fields have defaults matching the original's `config.h`
/// constants; each can be overridden by an environment variable so
/// tests (and operators) can shrink timeouts or window sizes without
/// rebuilding.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to accept sensor connections on.
    pub port: u16,
    /// Number of completed sessions after which the gateway shuts down.
    pub max_conn: u32,
    /// Per-field idle timeout for a session reader.
    pub t_idle: Duration,
    /// Running-average window length (`W`).
    pub window_len: usize,
    /// Lower "too cold" threshold.
    pub t_min: f64,
    /// Upper "too hot" threshold.
    pub t_max: f64,
    /// Path to the sensor-to-room map file.
    pub map_path: PathBuf,
    /// Path to the CSV storage sink.
    pub csv_path: PathBuf,
    /// Path to the domain event log.
    pub log_path: PathBuf,
}

impl GatewayConfig {
    /// Build a config from parsed CLI args plus environment overrides.
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let mut config = Self {
            port: args.port,
            max_conn: args.max_conn,
            t_idle: Duration::from_secs(DEFAULT_T_IDLE_SECS),
            window_len: DEFAULT_WINDOW_LEN,
            t_min: DEFAULT_T_MIN,
            t_max: DEFAULT_T_MAX,
            map_path: PathBuf::from(DEFAULT_MAP_PATH),
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
        };
        config.apply_env_overrides().context("applying environment overrides")?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(secs) = std::env::var("SENSOR_GATEWAY_T_IDLE") {
            self.t_idle = Duration::from_secs_f64(
                secs.parse().context("SENSOR_GATEWAY_T_IDLE must be a number")?,
            );
        }
        if let Ok(t_min) = std::env::var("SENSOR_GATEWAY_T_MIN") {
            self.t_min = t_min.parse().context("SENSOR_GATEWAY_T_MIN must be a number")?;
        }
        if let Ok(t_max) = std::env::var("SENSOR_GATEWAY_T_MAX") {
            self.t_max = t_max.parse().context("SENSOR_GATEWAY_T_MAX must be a number")?;
        }
        anyhow::ensure!(
            self.t_min < self.t_max,
            "t_min ({}) must be less than t_max ({})",
            self.t_min,
            self.t_max
        );
        if let Ok(map_path) = std::env::var("SENSOR_GATEWAY_MAP") {
            self.map_path = PathBuf::from(map_path);
        }
        if let Ok(csv_path) = std::env::var("SENSOR_GATEWAY_CSV") {
            self.csv_path = PathBuf::from(csv_path);
        }
        if let Ok(log_path) = std::env::var("SENSOR_GATEWAY_LOG") {
            self.log_path = PathBuf::from(log_path);
        }
        Ok(())
    }

    /// Build a config directly, bypassing the CLI and environment —
    /// used by tests that need a small `t_idle` or `window_len`.
    #[cfg(test)]
    pub fn for_test(port: u16, max_conn: u32, dir: &std::path::Path) -> Self {
        Self {
            port,
            max_conn,
            t_idle: Duration::from_millis(500),
            window_len: DEFAULT_WINDOW_LEN,
            t_min: DEFAULT_T_MIN,
            t_max: DEFAULT_T_MAX,
            map_path: dir.join(DEFAULT_MAP_PATH),
            csv_path: dir.join(DEFAULT_CSV_PATH),
            log_path: dir.join(DEFAULT_LOG_PATH),
        }
    }
}
