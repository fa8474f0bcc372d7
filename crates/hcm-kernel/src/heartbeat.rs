//! [`Heartbeat`] – arrival tracker for periodic message streams.
//!
//! Every producer that feeds the blackboard at a fixed rate (the IMU driver,
//! the motor state publisher, the motion planner sending goals) is tracked by
//! a heartbeat.  The heartbeat stores the timestamp of the most recent
//! message and considers the stream *timed out* once its deadline has been
//! reached.
//!
//! Time is always passed in explicitly so that a whole tick evaluates
//! against one `now`, and so tests can drive the clock.

use std::time::{Duration, Instant};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Health reported for a single message stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatHealth {
    /// No message has ever been received.
    Never,
    /// The last message arrived within the deadline.
    Healthy,
    /// The last message is at least `timeout` old.
    TimedOut,
}

// ────────────────────────────────────────────────────────────────────────────
// Heartbeat
// ────────────────────────────────────────────────────────────────────────────

/// Tracks the most recent arrival of one message stream.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use hcm_kernel::heartbeat::{Heartbeat, HeartbeatHealth};
///
/// let t0 = Instant::now();
/// let mut imu = Heartbeat::new(Duration::from_millis(100));
/// assert_eq!(imu.health(t0), HeartbeatHealth::Never);
///
/// imu.beat(t0);
/// assert_eq!(imu.health(t0 + Duration::from_millis(50)), HeartbeatHealth::Healthy);
/// assert_eq!(imu.health(t0 + Duration::from_millis(100)), HeartbeatHealth::TimedOut);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    last: Option<Instant>,
    timeout: Duration,
}

impl Heartbeat {
    /// Create a heartbeat that has never been seen.
    pub fn new(timeout: Duration) -> Self {
        Self {
            last: None,
            timeout,
        }
    }

    /// Record an arrival at `at`.
    ///
    /// Timestamps older than the stored one are ignored so a late-delivered
    /// message can never move the heartbeat backwards.
    pub fn beat(&mut self, at: Instant) {
        match self.last {
            Some(last) if last >= at => {}
            _ => self.last = Some(at),
        }
    }

    /// Timestamp of the most recent arrival, if any.
    pub fn last(&self) -> Option<Instant> {
        self.last
    }

    /// The configured deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time elapsed since the last arrival, measured at `now`.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.last.map(|last| now.saturating_duration_since(last))
    }

    /// Return the [`HeartbeatHealth`] at `now`.
    pub fn health(&self, now: Instant) -> HeartbeatHealth {
        match self.elapsed(now) {
            None => HeartbeatHealth::Never,
            Some(elapsed) if elapsed >= self.timeout => HeartbeatHealth::TimedOut,
            Some(_) => HeartbeatHealth::Healthy,
        }
    }

    /// `true` when a message has been seen and it is at least `timeout` old.
    pub fn is_timed_out(&self, now: Instant) -> bool {
        self.health(now) == HeartbeatHealth::TimedOut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_heartbeat_was_never_seen() {
        let hb = Heartbeat::new(Duration::from_secs(1));
        assert_eq!(hb.health(Instant::now()), HeartbeatHealth::Never);
        assert!(!hb.is_timed_out(Instant::now()));
        assert!(hb.last().is_none());
    }

    #[test]
    fn beat_resets_deadline() {
        let t0 = Instant::now();
        let mut hb = Heartbeat::new(Duration::from_millis(20));
        hb.beat(t0);
        hb.beat(t0 + Duration::from_millis(15));
        assert_eq!(
            hb.health(t0 + Duration::from_millis(30)),
            HeartbeatHealth::Healthy
        );
    }

    #[test]
    fn times_out_exactly_at_deadline() {
        let t0 = Instant::now();
        let mut hb = Heartbeat::new(Duration::from_millis(20));
        hb.beat(t0);
        assert!(!hb.is_timed_out(t0 + Duration::from_millis(19)));
        assert!(hb.is_timed_out(t0 + Duration::from_millis(20)));
    }

    #[test]
    fn late_beat_does_not_move_backwards() {
        let t0 = Instant::now();
        let mut hb = Heartbeat::new(Duration::from_millis(20));
        hb.beat(t0 + Duration::from_millis(10));
        hb.beat(t0);
        assert_eq!(hb.last(), Some(t0 + Duration::from_millis(10)));
    }

    #[test]
    fn now_before_last_beat_counts_as_zero_elapsed() {
        let t0 = Instant::now();
        let mut hb = Heartbeat::new(Duration::from_millis(20));
        hb.beat(t0 + Duration::from_millis(50));
        assert_eq!(hb.elapsed(t0), Some(Duration::ZERO));
        assert_eq!(hb.health(t0), HeartbeatHealth::Healthy);
    }
}
