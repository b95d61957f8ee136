//! Event kinds and payloads

use crate::realtime::InboundMessage;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of a realtime message, read from its `type` field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Aggregated access counters
    AccessStats,
    /// New access log entries
    AccessLogs,
    /// A pending registration was approved
    RegistrationApproved,
    /// A pending registration was rejected
    RegistrationRejected,
    /// One attendance mark (check-in, late arrival, ...)
    Activity,
    /// Attendance totals for the day
    Stats,
    /// Anything else
    Other(String),
}

impl EventKind {
    pub fn from_type(value: &str) -> Self {
        match value {
            "accessStats" => EventKind::AccessStats,
            "accessLogs" => EventKind::AccessLogs,
            "registrationApproved" => EventKind::RegistrationApproved,
            "registrationRejected" => EventKind::RegistrationRejected,
            "activity" => EventKind::Activity,
            "stats" => EventKind::Stats,
            other => EventKind::Other(other.to_string()),
        }
    }

    /// Kind of `message`, or `None` when it carries no string `type`
    pub fn of(message: &InboundMessage) -> Option<Self> {
        message.message_type().map(Self::from_type)
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::AccessStats => "accessStats",
            EventKind::AccessLogs => "accessLogs",
            EventKind::RegistrationApproved => "registrationApproved",
            EventKind::RegistrationRejected => "registrationRejected",
            EventKind::Activity => "activity",
            EventKind::Stats => "stats",
            EventKind::Other(other) => other,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attendance outcome of one activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    /// Any status string this client does not know
    #[serde(other)]
    Unknown,
}

/// An `activity` message.
///
/// Every field is optional and a field of the wrong type reads as `None`,
/// so any `activity` object is accepted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<AttendanceStatus>,
    #[serde(default, deserialize_with = "lenient")]
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<String>,
    /// Timestamp as sent; see [`Activity::time`]
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl Activity {
    /// When the activity happened, if `timestamp` holds an RFC 3339 string,
    /// a date-time without offset (read as UTC) or Unix epoch milliseconds.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        match self.timestamp.as_ref()? {
            Value::String(text) => parse_time(text),
            Value::Number(n) => {
                let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
                Utc.timestamp_millis_opt(millis).single()
            }
            _ => None,
        }
    }
}

fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// `None` instead of an error when the value has the wrong shape
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Totals carried under the `stats` key of a `stats` message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttendanceStats {
    #[serde(default)]
    pub present: u64,
    #[serde(default)]
    pub late: u64,
    #[serde(default)]
    pub absent: u64,
}

impl AttendanceStats {
    pub fn total(&self) -> u64 {
        self.present
            .saturating_add(self.late)
            .saturating_add(self.absent)
    }
}
