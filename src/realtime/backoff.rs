//! Reconnection backoff state

use std::time::Duration;

/// Retry counter and delay for one connection.
///
/// Each failure asks for the next delay: `base * 2^(attempt - 1)`, capped at
/// `max`. A successful open calls [`Backoff::reset`]. Once more than
/// `max_attempts` retries would be needed, [`Backoff::next_delay`] returns
/// `None` and the caller gives up. `max_attempts == 0` retries forever.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    max_attempts: u32,
    attempts: u32,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max: max.max(base),
            max_attempts,
            attempts: 0,
            current: base,
        }
    }

    /// Retries taken since the last successful open
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay used for the most recent retry, or the base delay after a reset
    pub fn current_delay(&self) -> Duration {
        self.current
    }

    /// Whether the retry budget is spent
    pub fn is_exhausted(&self) -> bool {
        self.max_attempts > 0 && self.attempts >= self.max_attempts
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts = self.attempts.saturating_add(1);

        let factor = 1u32.checked_shl(self.attempts - 1).unwrap_or(u32::MAX);
        self.current = self.base.saturating_mul(factor).min(self.max);
        Some(self.current)
    }

    /// Back to a fresh budget after a successful open
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current = self.base;
    }
}
