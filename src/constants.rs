//! Build-time defaults for the gateway pipeline.
//!
//! These mirror the compile-time constants of the original `config.h`
//! (`RUN_AVG_LENGTH`, `TIMEOUT`, `MSG_MAX`) and can be overridden at
//! startup through [`crate::config::GatewayConfig`] without touching
//! the source.

/// Length of the per-sensor running-average window (`W`).
pub const DEFAULT_WINDOW_LEN: usize = 5;

/// Seconds a per-session reader waits for the next field before the
/// session is considered idle (`T_IDLE`).
pub const DEFAULT_T_IDLE_SECS: u64 = 15;

/// Lower temperature threshold; averages below this are "too cold".
pub const DEFAULT_T_MIN: f64 = 10.0;

/// Upper temperature threshold; averages above this are "too hot".
pub const DEFAULT_T_MAX: f64 = 20.0;

/// Maximum size in bytes of one domain log record, zero-padded.
pub const MSG_MAX: usize = 256;

/// Bounded interval the accept loop waits for the listening socket to
/// become readable before re-checking the completion quota.
pub const ACCEPT_POLL_INTERVAL_MS: u64 = 200;

/// Default path for the sensor-to-room map file.
pub const DEFAULT_MAP_PATH: &str = "room_sensor.map";

/// Default path for the CSV storage sink.
pub const DEFAULT_CSV_PATH: &str = "data.csv";

/// Default path for the domain event log.
pub const DEFAULT_LOG_PATH: &str = "gateway.log";

/// Inclusive valid range for the `port` CLI argument.
pub const PORT_RANGE: std::ops::RangeInclusive<u32> = 1..=65535;

/// Inclusive valid range for the `max_conn` CLI argument.
pub const MAX_CONN_RANGE: std::ops::RangeInclusive<u32> = 1..=1_000_000;
