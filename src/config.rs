//! Configuration types for nfc-realtime

use crate::realtime::{ClientConfig, DEFAULT_URL};
use crate::telemetry::LogFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable that overrides the realtime endpoint
pub const URL_ENV: &str = "NFC_WS_URL";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Realtime connection configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// WebSocket endpoint
    #[serde(default = "default_url")]
    pub url: String,

    /// Delay before the first reconnection attempt (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling for the doubled reconnection delay (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Reconnection attempts before giving up (0 = never give up)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Keepalive ping interval (seconds, 0 disables)
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Time allowed for a pong after a ping (seconds)
    #[serde(default = "default_pong_timeout_secs")]
    pub pong_timeout_secs: u64,
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_max_attempts() -> u32 {
    5
}
fn default_ping_interval_secs() -> u64 {
    30
}
fn default_pong_timeout_secs() -> u64 {
    10
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 5,
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
        }
    }
}

impl RealtimeConfig {
    /// Runtime configuration for [`crate::realtime::RealtimeClient`]
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(&self.url)
            .max_reconnects(self.max_attempts)
            .base_delay(Duration::from_millis(self.base_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .pong_timeout(Duration::from_secs(self.pong_timeout_secs));

        match self.ping_interval_secs {
            0 => config.without_keepalive(),
            secs => config.ping_interval(Duration::from_secs(secs)),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Port for the Prometheus exporter; unset disables it
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.realtime.url = url.trim().to_string();
        }
        self
    }
}
