//! Prometheus metrics

use crate::realtime::ConnectionState;

/// Counter metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeCounter {
    /// Handshake attempts, including the first
    ConnectAttempts,
    /// Successful handshakes
    Opens,
    /// Failed handshakes and lost connections
    Failures,
    /// Retry budget exhausted
    GiveUps,
    /// Messages decoded and dispatched
    MessagesReceived,
    /// Frames dropped because they were not JSON objects
    MalformedMessages,
    /// Messages handed to an open connection
    MessagesSent,
    /// Sends rejected because the connection was not open
    SendsDropped,
}

impl RealtimeCounter {
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeCounter::ConnectAttempts => "nfc_realtime_connect_attempts_total",
            RealtimeCounter::Opens => "nfc_realtime_opens_total",
            RealtimeCounter::Failures => "nfc_realtime_failures_total",
            RealtimeCounter::GiveUps => "nfc_realtime_give_ups_total",
            RealtimeCounter::MessagesReceived => "nfc_realtime_messages_received_total",
            RealtimeCounter::MalformedMessages => "nfc_realtime_malformed_messages_total",
            RealtimeCounter::MessagesSent => "nfc_realtime_messages_sent_total",
            RealtimeCounter::SendsDropped => "nfc_realtime_sends_dropped_total",
        }
    }
}

const CONNECTION_STATE_GAUGE: &str = "nfc_realtime_connection_state";

/// Increment a counter by one
pub fn increment(counter: RealtimeCounter) {
    metrics::counter!(counter.name()).increment(1);
}

/// Report the current connection state on the state gauge
pub fn set_connection_state(state: &ConnectionState) {
    metrics::gauge!(CONNECTION_STATE_GAUGE).set(state.gauge_value());
}
