//! Dashboard realtime events
//!
//! Typed helpers over the `type` field convention that dashboard widgets use
//! to interpret realtime messages. The client itself never looks at these.

mod tracker;
mod types;

pub use tracker::{AttendanceTracker, TrackerUpdate, RECENT_ACTIVITY_LIMIT};
pub use types::{Activity, AttendanceStats, AttendanceStatus, EventKind};
