use crate::constants::clock::MAX_DRIFT_MS;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::warn;

/// Detects wall-clock jumps by comparing wall and monotonic elapsed time
/// between two checks.
#[derive(Debug, Clone, Copy)]
pub struct ClockMonitor {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl Default for ClockMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockMonitor {
    pub fn new() -> Self {
        Self::starting_at(Utc::now(), Instant::now())
    }

    pub fn starting_at(wall: DateTime<Utc>, mono: Instant) -> Self {
        Self { wall, mono }
    }

    pub fn check(&mut self) -> Option<i64> {
        self.observe(Utc::now(), Instant::now())
    }

    /// Record a sample; returns the drift in ms when it reaches the jump threshold
    pub fn observe(&mut self, wall: DateTime<Utc>, mono: Instant) -> Option<i64> {
        let wall_elapsed = (wall - self.wall).num_milliseconds();
        let mono_elapsed = i64::try_from(mono.saturating_duration_since(self.mono).as_millis())
            .unwrap_or(i64::MAX);
        self.wall = wall;
        self.mono = mono;

        let drift = wall_elapsed.saturating_sub(mono_elapsed);
        if drift.abs() >= MAX_DRIFT_MS {
            warn!(drift_ms = drift, "System time change detected");
            Some(drift)
        } else {
            None
        }
    }
}
