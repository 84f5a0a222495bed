//! A multi-threaded TCP gateway that accepts sensor measurement
//! sessions, fans each record out to a Data Manager (running averages,
//! threshold events) and a Storage Manager (CSV append), and shuts
//! down once a configured number of sessions have completed.
//!
//! See `SPEC_FULL.md` in the repository root for the full design.

pub mod buffer;
pub mod config;
pub mod conn_state;
pub mod connection_manager;
pub mod constants;
pub mod data_manager;
pub mod logger;
pub mod measurement;
pub mod sensor_map;
pub mod storage;

pub use buffer::SharedBuffer;
pub use config::GatewayConfig;
pub use conn_state::ConnState;
pub use data_manager::SensorTable;
pub use logger::{EventLogger, EventLoggerHandle};
pub use measurement::Measurement;
pub use sensor_map::SensorMap;
