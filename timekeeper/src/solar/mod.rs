//! Solar event scheduling
//!
//! - `sun`: raw per-day event instants for a latitude/longitude
//! - `coordinates`: free-text location parsing ("51.5,-0.1", DMS with N/S/E/W)
//! - `timeline`: bracketing past/future events and the current twilight/day/night state

pub mod coordinates;
pub mod sun;
pub mod timeline;

pub use coordinates::{parse_location, Coordinates};
pub use timeline::{solar_timeline, Direction, SolarEventTime, SolarState, SolarTimes};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selectable solar events in daily order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SolarEvent {
    NightEnd = 0,
    NauticalDawn = 1,
    CivilDawn = 2,
    Sunrise = 3,
    SunriseEnd = 4,
    MorningGoldenHourEnd = 5,
    SolarNoon = 6,
    EveningGoldenHourStart = 7,
    SunsetStart = 8,
    Sunset = 9,
    CivilDusk = 10,
    NauticalDusk = 11,
    NightStart = 12,
    Nadir = 13,
}

impl SolarEvent {
    pub const ALL: [SolarEvent; 14] = [
        SolarEvent::NightEnd,
        SolarEvent::NauticalDawn,
        SolarEvent::CivilDawn,
        SolarEvent::Sunrise,
        SolarEvent::SunriseEnd,
        SolarEvent::MorningGoldenHourEnd,
        SolarEvent::SolarNoon,
        SolarEvent::EveningGoldenHourStart,
        SolarEvent::SunsetStart,
        SolarEvent::Sunset,
        SolarEvent::CivilDusk,
        SolarEvent::NauticalDusk,
        SolarEvent::NightStart,
        SolarEvent::Nadir,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SolarEvent::NightEnd => "nightEnd",
            SolarEvent::NauticalDawn => "nauticalDawn",
            SolarEvent::CivilDawn => "civilDawn",
            SolarEvent::Sunrise => "sunrise",
            SolarEvent::SunriseEnd => "sunriseEnd",
            SolarEvent::MorningGoldenHourEnd => "morningGoldenHourEnd",
            SolarEvent::SolarNoon => "solarNoon",
            SolarEvent::EveningGoldenHourStart => "eveningGoldenHourStart",
            SolarEvent::SunsetStart => "sunsetStart",
            SolarEvent::Sunset => "sunset",
            SolarEvent::CivilDusk => "civilDusk",
            SolarEvent::NauticalDusk => "nauticalDusk",
            SolarEvent::NightStart => "nightStart",
            SolarEvent::Nadir => "nadir",
        }
    }

    /// Comma separated names of every selectable event
    pub fn all_csv() -> String {
        Self::ALL
            .iter()
            .map(|e| e.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Keep the recognised names, dropping unknown ones
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Vec<SolarEvent> {
        names
            .iter()
            .filter_map(|name| name.as_ref().trim().parse().ok())
            .collect()
    }
}

impl FromStr for SolarEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("unknown solar event '{}'", s))
    }
}

impl fmt::Display for SolarEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
