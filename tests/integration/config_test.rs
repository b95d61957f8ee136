//! Integration tests for configuration loading

use nfc_realtime::config::{Config, URL_ENV};
use nfc_realtime::telemetry::LogFormat;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_example_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");
    let config = Config::load(path).unwrap();
    assert_eq!(config.realtime.url, "ws://localhost:3000");
    assert_eq!(config.realtime.max_attempts, 5);
    assert!(config.telemetry.metrics_port.is_none());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [realtime]
        url = "wss://campus.example.edu/ws"
        base_delay_ms = 200
        ping_interval_secs = 0

        [telemetry]
        log_level = "debug"
        log_format = "json"
        metrics_port = 9464
    "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    let client = config.realtime.client_config();
    assert_eq!(client.url, "wss://campus.example.edu/ws");
    assert_eq!(client.base_reconnect_delay, Duration::from_millis(200));
    assert_eq!(client.max_reconnect_delay, Duration::from_secs(30));
    assert!(client.ping_interval.is_none());
    assert_eq!(config.telemetry.log_format, LogFormat::Json);
    assert_eq!(config.telemetry.metrics_port, Some(9464));
}

#[test]
fn test_load_rejects_invalid_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[realtime\nurl = ").unwrap();
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn test_override_after_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[realtime]\nurl = \"ws://from-file:3000\"\n").unwrap();

    let config = Config::load(file.path())
        .unwrap()
        .apply_overrides(|key| (key == URL_ENV).then(|| "ws://from-env:4000".to_string()));
    assert_eq!(config.realtime.url, "ws://from-env:4000");
}
