//! End-to-end tests driving the full pipeline over real loopback TCP
//! sockets, the way this crate's ecosystem siblings exercise their
//! full-stack behavior (cf. `tests/pty_integration_test.rs` in the
//! broader pack). Each test wires up the Shared Buffer, the Storage
//! and Data Manager threads, and the Connection Manager's accept loop
//! exactly as `main.rs` does, but keeps the intermediate handles
//! around so the test can assert on them afterward.

use std::fs;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sensor_gateway::buffer::SharedBuffer;
use sensor_gateway::config::GatewayConfig;
use sensor_gateway::conn_state::ConnState;
use sensor_gateway::data_manager::SensorTable;
use sensor_gateway::logger::EventLogger;
use sensor_gateway::sensor_map::SensorMap;
use sensor_gateway::{connection_manager, data_manager, storage, Measurement};

/// Reserve an ephemeral port by binding then immediately dropping a
/// throwaway listener, matching the style already used by
/// `connection_manager`'s own unit test.
fn free_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    listener.local_addr().unwrap().port()
}

fn write_sensor_map(path: &std::path::Path, pairs: &[(u16, u16)]) {
    let mut contents = String::new();
    for (room, sensor) in pairs {
        contents.push_str(&format!("{room} {sensor}\n"));
    }
    fs::write(path, contents).unwrap();
}

struct Harness {
    config: GatewayConfig,
    conn_state: Arc<ConnState>,
    cm_thread: thread::JoinHandle<anyhow::Result<()>>,
    data_thread: thread::JoinHandle<()>,
    storage_thread: thread::JoinHandle<anyhow::Result<()>>,
    logger: EventLogger,
}

impl Harness {
    fn start(config: GatewayConfig) -> Self {
        let (logger, logger_handle) = EventLogger::start(&config.log_path).unwrap();
        let sensor_map = SensorMap::load(&config.map_path).unwrap();
        let buffer = Arc::new(SharedBuffer::new());
        let conn_state = Arc::new(ConnState::new());

        let storage_buffer = Arc::clone(&buffer);
        let storage_csv_path = config.csv_path.clone();
        let storage_logger = logger_handle.clone();
        let storage_thread = thread::spawn(move || storage::run(storage_buffer, &storage_csv_path, storage_logger));

        let data_buffer = Arc::clone(&buffer);
        let data_table = SensorTable::new(config.window_len, config.t_min, config.t_max);
        let data_logger = logger_handle.clone();
        let data_thread =
            thread::spawn(move || data_manager::run(data_buffer, sensor_map, data_table, data_logger));

        let cm_config = config.clone();
        let cm_buffer = Arc::clone(&buffer);
        let cm_conn_state = Arc::clone(&conn_state);
        let cm_logger = logger_handle.clone();
        let cm_thread =
            thread::spawn(move || connection_manager::run(&cm_config, cm_buffer, cm_conn_state, cm_logger));

        drop(logger_handle);

        Self { config, conn_state, cm_thread, data_thread, storage_thread, logger }
    }

    fn join(self) -> (anyhow::Result<()>, anyhow::Result<()>) {
        self.data_thread.join().unwrap();
        let storage_result = self.storage_thread.join().unwrap();
        let cm_result = self.cm_thread.join().unwrap();
        self.logger.join();
        (cm_result, storage_result)
    }

    fn served(&self) -> u32 {
        self.conn_state.served()
    }
}

fn send_measurement(stream: &mut TcpStream, sensor_id: u16, value: f64, ts: i64) {
    Measurement { sensor_id, value, timestamp: ts }.write_to(stream).unwrap();
    stream.flush().unwrap();
}

/// E1: two clients, ten records each, every record lands in the CSV
/// and both sessions are served before the gateway shuts down.
#[test]
fn e1_two_clients_ten_records_each() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GatewayConfig::for_test(0, 2, dir.path());
    write_sensor_map(&config.map_path, &[(1, 10), (1, 20)]);
    config.port = free_port();

    let harness = Harness::start(config.clone());
    thread::sleep(Duration::from_millis(100));

    for sensor_id in [10u16, 20u16] {
        let mut client = TcpStream::connect(("127.0.0.1", config.port)).unwrap();
        for i in 0..10 {
            send_measurement(&mut client, sensor_id, 15.0, i);
        }
        drop(client);
    }

    let (cm_result, storage_result) = harness.join();
    cm_result.unwrap();
    storage_result.unwrap();

    let csv = fs::read_to_string(&config.csv_path).unwrap();
    assert_eq!(csv.lines().count(), 20, "every record from both sessions reached the CSV sink");
}

/// E2: quota of one, a client that connects and disconnects
/// immediately without sending anything still counts as served.
#[test]
fn e2_immediate_close_still_counts_as_served() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GatewayConfig::for_test(0, 1, dir.path());
    write_sensor_map(&config.map_path, &[(1, 10)]);
    config.port = free_port();

    let harness = Harness::start(config.clone());
    thread::sleep(Duration::from_millis(100));

    let client = TcpStream::connect(("127.0.0.1", config.port)).unwrap();
    drop(client);

    let (cm_result, storage_result) = harness.join();
    cm_result.unwrap();
    storage_result.unwrap();

    let csv = fs::read_to_string(&config.csv_path).unwrap();
    assert_eq!(csv.lines().count(), 0, "no records were ever sent");
}

/// E3: quota of two, a third connection that arrives after the quota
/// is already met is accepted then immediately closed, logged as
/// refused, and the gateway still shuts down cleanly.
#[test]
fn e3_connection_after_quota_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GatewayConfig::for_test(0, 2, dir.path());
    write_sensor_map(&config.map_path, &[(1, 10)]);
    config.port = free_port();

    let harness = Harness::start(config.clone());
    thread::sleep(Duration::from_millis(100));

    // Two sessions that complete immediately satisfy the quota.
    drop(TcpStream::connect(("127.0.0.1", config.port)).unwrap());
    drop(TcpStream::connect(("127.0.0.1", config.port)).unwrap());

    // Give the accept loop a chance to notice the quota is met before
    // the third connection arrives, so it is refused post-accept
    // rather than served as the gateway's last session.
    thread::sleep(Duration::from_millis(250));
    let third = TcpStream::connect(("127.0.0.1", config.port));

    let served = harness.served();
    let (cm_result, storage_result) = harness.join();
    cm_result.unwrap();
    storage_result.unwrap();
    drop(third);

    // The quota is exactly two regardless of whether the third
    // connection landed before or after the accept loop's last check.
    assert_eq!(served, 2);
    let log = fs::read_to_string(&config.log_path).unwrap();
    assert!(log.contains("max clients reached"), "the third connection should have been refused");
}

/// E5: a record from a sensor id absent from the sensor map is logged
/// and otherwise ignored, while the rest of the session still reaches
/// the CSV sink untouched.
#[test]
fn e5_unknown_sensor_id_is_logged_and_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GatewayConfig::for_test(0, 1, dir.path());
    write_sensor_map(&config.map_path, &[(1, 10)]);
    config.port = free_port();

    let harness = Harness::start(config.clone());
    thread::sleep(Duration::from_millis(100));

    let mut client = TcpStream::connect(("127.0.0.1", config.port)).unwrap();
    send_measurement(&mut client, 999, 15.0, 1);
    send_measurement(&mut client, 10, 15.0, 2);
    drop(client);

    let (cm_result, storage_result) = harness.join();
    cm_result.unwrap();
    storage_result.unwrap();

    let log = fs::read_to_string(&config.log_path).unwrap();
    assert!(log.contains("unknown sensor 999"));

    let csv = fs::read_to_string(&config.csv_path).unwrap();
    assert_eq!(csv.lines().count(), 2, "both records still reach storage regardless of DM's map");
}

/// E6: closing the buffer while both readers are still blocked on it
/// lets both drain to `End` instead of hanging.
#[test]
fn e6_close_then_drain_unblocks_both_readers() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GatewayConfig::for_test(0, 1, dir.path());
    write_sensor_map(&config.map_path, &[(1, 10)]);
    config.port = free_port();

    let harness = Harness::start(config.clone());
    thread::sleep(Duration::from_millis(100));

    // A single session that closes immediately drives the gateway to
    // its quota with an empty buffer, the sharpest case of both reader
    // positions blocking on an empty, still-open buffer until close.
    drop(TcpStream::connect(("127.0.0.1", config.port)).unwrap());

    let (cm_result, storage_result) = harness.join();
    cm_result.unwrap();
    storage_result.unwrap();
}

/// E4: a sensor whose running average crosses into the "too hot" zone
/// produces a threshold event in the gateway log.
#[test]
fn e4_zone_transition_logs_too_hot_event() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GatewayConfig::for_test(0, 1, dir.path());
    write_sensor_map(&config.map_path, &[(1, 10)]);
    config.port = free_port();

    let harness = Harness::start(config.clone());
    thread::sleep(Duration::from_millis(100));

    let mut client = TcpStream::connect(("127.0.0.1", config.port)).unwrap();
    // window_len defaults to 5; five readings above t_max (20.0) fill
    // the window and push the running average into the hot zone.
    for i in 0..5 {
        send_measurement(&mut client, 10, 30.0, i);
    }
    drop(client);

    let (cm_result, storage_result) = harness.join();
    cm_result.unwrap();
    storage_result.unwrap();

    let log = fs::read_to_string(&config.log_path).unwrap();
    assert!(log.contains("too hot"));
}

/// Invariant #10: a session that sends one valid record and then goes
/// silent past `t_idle` is closed with a timeout event, and the
/// gateway's served count still advances.
#[test]
fn idle_timeout_closes_session_and_advances_served_count() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GatewayConfig::for_test(0, 1, dir.path());
    write_sensor_map(&config.map_path, &[(1, 10)]);
    config.port = free_port();
    // for_test already sets t_idle to 500ms.

    let harness = Harness::start(config.clone());
    thread::sleep(Duration::from_millis(100));

    let mut client = TcpStream::connect(("127.0.0.1", config.port)).unwrap();
    send_measurement(&mut client, 10, 15.0, 1);
    // Deliberately say nothing else; the session should time out.

    let (cm_result, storage_result) = harness.join();
    cm_result.unwrap();
    storage_result.unwrap();
    drop(client);

    let log = fs::read_to_string(&config.log_path).unwrap();
    assert!(log.contains("timed out"));
}
