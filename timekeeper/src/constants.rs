//! Central repository for timing bounds, defaults and format versions
//!
//! Constants are grouped by the component that owns them so that the
//! scheduler loop, the solar timeline and the persistence layer agree on
//! one source of truth.

use std::time::Duration;

/// Clock monitoring constants
pub mod clock {
    use super::Duration;

    /// Interval between wall-clock self checks
    pub const CHECK_INTERVAL: Duration = Duration::from_secs(1);

    /// Drift between wall and monotonic elapsed time treated as a clock jump
    pub const MAX_DRIFT_MS: i64 = 5000;

    /// Longest sleep of the service loop when nothing is armed
    pub const IDLE_WAIT: Duration = Duration::from_secs(3600);
}

/// Solar timeline scan bounds
pub mod solar {
    /// Days scanned backwards (starting at tomorrow) for past events
    pub const BACKWARD_SCAN_DAYS: u32 = 3;

    /// Days scanned forwards (starting at yesterday) for future events.
    /// Empirical bound for polar latitudes, roughly six months.
    pub const FORWARD_SCAN_DAYS: u32 = 183;
}

/// Schedule defaults applied to incomplete specs
pub mod defaults {
    /// Cron expression used when a cron schedule has none (every minute)
    pub const CRON_EXPRESSION: &str = "0 * * * * * *";

    /// Solar events used when a solar schedule selects none
    pub const SOLAR_EVENTS: &str = "sunrise,sunset";

    /// Payload type used when none is given
    pub const PAYLOAD_TYPE: &str = "default";

    /// Message property that receives the resolved payload
    pub const OUTPUT_FIELD: &str = "payload";

    /// Directory for persisted dynamic schedules
    pub const PERSIST_DIR: &str = "data/timekeeper";

    /// Number of upcoming dates reported by `describe`
    pub const PREVIEW_DATES: usize = 5;
}

/// Persistence format
pub mod persistence {
    /// Snapshot format version; any other value is rejected on load
    pub const SNAPSHOT_VERSION: u32 = 1;
}
