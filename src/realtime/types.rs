//! Realtime client types and configuration

use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Endpoint used when nothing else is configured
pub const DEFAULT_URL: &str = "ws://localhost:3000";

/// Realtime client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL to connect to
    pub url: String,
    /// Reconnection attempts allowed after a failure before giving up
    pub max_reconnect_attempts: u32,
    /// Delay before the first reconnection attempt
    pub base_reconnect_delay: Duration,
    /// Ceiling for the doubled delay
    pub max_reconnect_delay: Duration,
    /// Interval for sending ping frames (`None` disables keepalive)
    pub ping_interval: Option<Duration>,
    /// How long to wait for a pong before treating the link as dead.
    /// Also bounds every frame write.
    pub pong_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            max_reconnect_attempts: 5,
            base_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            ping_interval: Some(Duration::from_secs(30)),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Create a new config with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set maximum reconnection attempts
    pub fn max_reconnects(mut self, n: u32) -> Self {
        self.max_reconnect_attempts = n;
        self
    }

    /// Set base reconnection delay
    pub fn base_delay(mut self, d: Duration) -> Self {
        self.base_reconnect_delay = d;
        self
    }

    /// Set maximum reconnection delay
    pub fn max_delay(mut self, d: Duration) -> Self {
        self.max_reconnect_delay = d;
        self
    }

    /// Set ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = Some(d);
        self
    }

    /// Turn off ping/pong keepalive
    pub fn without_keepalive(mut self) -> Self {
        self.ping_interval = None;
        self
    }

    /// Set pong timeout
    pub fn pong_timeout(mut self, d: Duration) -> Self {
        self.pong_timeout = d;
        self
    }
}

/// Lifecycle state of a realtime connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, `connect()` not called yet
    Idle,
    /// Handshake in progress
    Connecting,
    /// Connected and delivering messages
    Open,
    /// Lost the connection, waiting `delay` before retry number `attempt`
    Retrying { attempt: u32, delay: Duration },
    /// Retry budget exhausted
    GivenUp,
    /// Torn down by the caller
    Closed,
}

impl ConnectionState {
    /// Whether a connection worker may still be running in this state
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Retrying { .. }
        )
    }

    /// Numeric code reported on the state gauge
    pub fn gauge_value(&self) -> f64 {
        match self {
            ConnectionState::Idle => 0.0,
            ConnectionState::Connecting => 1.0,
            ConnectionState::Open => 2.0,
            ConnectionState::Retrying { .. } => 3.0,
            ConnectionState::GivenUp => 4.0,
            ConnectionState::Closed => 5.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Retrying { attempt, delay } => {
                write!(f, "retrying (attempt {} in {}ms)", attempt, delay.as_millis())
            }
            ConnectionState::GivenUp => write!(f, "given up"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// A decoded inbound message: one JSON object
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    fields: Map<String, Value>,
}

impl InboundMessage {
    /// Decode a text frame. Anything but a JSON object is malformed.
    pub fn decode(text: &str) -> Result<Self, RealtimeError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| RealtimeError::MalformedMessage(e.to_string()))?;

        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(RealtimeError::MalformedMessage(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// The conventional `type` discriminator, if present and a string
    pub fn message_type(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    /// Look up a top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Borrow all fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Take ownership of the fields
    pub fn into_inner(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for InboundMessage {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Realtime client errors
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// Connection could not be established or was lost
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// Inbound frame was not a JSON object
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    /// Send attempted while the connection is not open
    #[error("Realtime connection is not open")]
    NotConnected,
    /// Outbound buffer is full because the socket is not keeping up
    #[error("Realtime outbound buffer is full")]
    OutboundFull,
    /// Outbound value could not be serialized
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    /// Client was closed by its owner
    #[error("Realtime client is closed")]
    Closed,
}
