//! Attendance tracker fed by realtime messages

use super::types::{Activity, AttendanceStats, EventKind};
use crate::realtime::{InboundMessage, RealtimeClient, Subscription};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Number of recent activities kept
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// What a message changed in the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerUpdate {
    Activity(Activity),
    Stats(AttendanceStats),
}

/// Keeps the latest attendance totals and the most recent activities,
/// newest first.
#[derive(Debug, Clone)]
pub struct AttendanceTracker {
    recent: VecDeque<Activity>,
    stats: AttendanceStats,
    limit: usize,
}

impl Default for AttendanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AttendanceTracker {
    pub fn new() -> Self {
        Self::with_limit(RECENT_ACTIVITY_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(limit),
            stats: AttendanceStats::default(),
            limit,
        }
    }

    /// Recent activities, newest first
    pub fn recent(&self) -> impl Iterator<Item = &Activity> {
        self.recent.iter()
    }

    pub fn stats(&self) -> AttendanceStats {
        self.stats
    }

    /// Apply one message. Every `activity` object is recorded; messages of
    /// other kinds, and `stats` without a usable totals object, leave the
    /// tracker untouched.
    pub fn observe(&mut self, message: &InboundMessage) -> Option<TrackerUpdate> {
        match EventKind::of(message)? {
            EventKind::Activity => {
                let activity: Activity =
                    match serde_json::from_value(serde_json::Value::Object(message.fields().clone())) {
                        Ok(activity) => activity,
                        Err(e) => {
                            tracing::warn!(error = %e, "Ignoring activity with unexpected shape");
                            return None;
                        }
                    };
                if self.limit == 0 {
                    return Some(TrackerUpdate::Activity(activity));
                }
                if self.recent.len() == self.limit {
                    self.recent.pop_back();
                }
                self.recent.push_front(activity.clone());
                Some(TrackerUpdate::Activity(activity))
            }
            EventKind::Stats => {
                let raw = message.get("stats")?.clone();
                match serde_json::from_value::<AttendanceStats>(raw) {
                    Ok(stats) => {
                        self.stats = stats;
                        Some(TrackerUpdate::Stats(stats))
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring stats with unexpected shape");
                        None
                    }
                }
            }
            _ => None,
        }
    }

    /// Feed `tracker` from every message `client` receives
    pub fn attach(tracker: Arc<Mutex<Self>>, client: &RealtimeClient) -> Subscription {
        client.subscribe(move |message| {
            if let Some(update) = tracker.lock().observe(message) {
                tracing::debug!(?update, "Attendance tracker updated");
            }
        })
    }
}
