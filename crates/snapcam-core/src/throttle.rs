//! Wall-clock throttle for preview refreshes.
//!
//! Consumers poll [`ThrottleGate::due_for_refresh`] once per frame and call
//! [`ThrottleGate::mark_refreshed`] only when a refresh actually happened.
//! Timestamps are offsets from an arbitrary monotonic origin.

use std::time::Duration;

/// Time between refreshes at `preview_fps`, or `None` when the rate does not
/// map to a representable interval.
pub fn refresh_interval(preview_fps: f32) -> Option<Duration> {
    Duration::try_from_secs_f64(1.0 / f64::from(preview_fps)).ok()
}

/// Decides whether the offscreen viewport is due for a refresh.
#[derive(Debug, Clone)]
pub struct ThrottleGate {
    interval: Duration,
    last_refresh: Option<Duration>,
}

impl ThrottleGate {
    /// Gate allowing at most `preview_fps` refreshes per second. The first
    /// query is always due. A rate whose interval cannot be represented
    /// (non-positive, NaN, or vanishingly small) refreshes only once.
    pub fn new(preview_fps: f32) -> Self {
        Self {
            interval: refresh_interval(preview_fps).unwrap_or(Duration::MAX),
            last_refresh: None,
        }
    }

    /// True iff at least one refresh interval has elapsed since the last
    /// refresh. A clock that runs backwards never makes the gate due.
    pub fn due_for_refresh(&self, now: Duration) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => now.checked_sub(last).is_some_and(|dt| dt >= self.interval),
        }
    }

    /// Record that a refresh happened at `now`.
    pub fn mark_refreshed(&mut self, now: Duration) {
        self.last_refresh = Some(now);
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_refresh(&self) -> Option<Duration> {
        self.last_refresh
    }
}
