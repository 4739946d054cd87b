use crate::errors::ValidationError;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Zone used for cron evaluation, naive date parsing and display.
///
/// Zone data comes from the static `chrono-tz` table; nothing here is mutable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ScheduleTimeZone {
    #[default]
    Local,
    Named(Tz),
}

impl ScheduleTimeZone {
    /// Empty or missing names select the host zone
    pub fn parse(name: Option<&str>) -> Result<Self, ValidationError> {
        match name.map(str::trim) {
            None | Some("") => Ok(ScheduleTimeZone::Local),
            Some(zone) => zone
                .parse::<Tz>()
                .map(ScheduleTimeZone::Named)
                .map_err(|_| ValidationError::InvalidTimeZone {
                    zone: zone.to_string(),
                }),
        }
    }

    pub fn name(&self) -> String {
        match self {
            ScheduleTimeZone::Named(tz) => tz.name().to_string(),
            ScheduleTimeZone::Local => host_zone_name(),
        }
    }

    /// Interpret a wall-clock time in this zone. Ambiguous times take the earlier instant.
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            ScheduleTimeZone::Named(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            ScheduleTimeZone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// Short human form, e.g. "18 Oct 2026 06:42:10 BST"
    pub fn format_short(&self, instant: DateTime<Utc>) -> String {
        const FORMAT: &str = "%d %b %Y %H:%M:%S %Z";
        match self {
            ScheduleTimeZone::Named(tz) => instant.with_timezone(tz).format(FORMAT).to_string(),
            ScheduleTimeZone::Local => instant.with_timezone(&Local).format(FORMAT).to_string(),
        }
    }
}

pub fn host_zone_name() -> String {
    std::env::var("TZ")
        .ok()
        .filter(|tz| !tz.is_empty())
        .unwrap_or_else(|| "Local".to_string())
}
