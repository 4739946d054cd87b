//! Solar timeline: which requested events come next, and what the sky is doing now.
//!
//! Past events are found by scanning backwards from tomorrow, future events by
//! scanning forwards from yesterday. The forward scan runs long enough to find
//! the next sunrise/sunset after a polar day or night. Both scans are bounded
//! and synchronous.

use super::coordinates::Coordinates;
use super::sun::sun_times;
use super::SolarEvent;
use crate::constants::solar::{BACKWARD_SCAN_DAYS, FORWARD_SCAN_DAYS};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rise,
    Fall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolarEventTime {
    pub event: SolarEvent,
    pub time: DateTime<Utc>,
    pub time_offset: DateTime<Utc>,
}

/// Sky classification as of one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolarState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    pub day: bool,
    pub night: bool,
    pub astrological_twilight: bool,
    pub nautical_twilight: bool,
    pub civil_twilight: bool,
    pub golden_hour: bool,
    pub twilight: bool,
    pub morning_twilight: bool,
    pub evening_twilight: bool,
    pub dawn: bool,
    pub dusk: bool,
    pub morning_golden_hour: bool,
    pub evening_golden_hour: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolarTimes {
    pub solar_state: SolarState,
    pub next_event: Option<SolarEvent>,
    pub next_event_time: Option<DateTime<Utc>>,
    pub next_event_time_offset: Option<DateTime<Utc>>,
    pub event_times: Vec<SolarEventTime>,
}

#[derive(Debug, Clone, Copy)]
struct Flags {
    day: bool,
    night: bool,
    astronomical: bool,
    nautical: bool,
    civil: bool,
    morning_golden: bool,
    evening_golden: bool,
}

const fn flags(
    day: bool,
    night: bool,
    astronomical: bool,
    nautical: bool,
    civil: bool,
    morning_golden: bool,
    evening_golden: bool,
) -> Option<Flags> {
    Some(Flags {
        day,
        night,
        astronomical,
        nautical,
        civil,
        morning_golden,
        evening_golden,
    })
}

/// What passing an event does to the state: (label, direction, flags).
/// Indexed by `SolarEvent::index()`. `None` keeps the previous value.
#[rustfmt::skip]
const TRANSITIONS: [(Option<&str>, Direction, Option<Flags>); 14] = [
    /* nightEnd */               (Some("Astronomical Twilight"), Direction::Rise, flags(false, false, true, false, false, false, false)),
    /* nauticalDawn */           (Some("Nautical Twilight"), Direction::Rise, flags(false, false, false, true, false, false, false)),
    /* civilDawn */              (Some("Civil Twilight"), Direction::Rise, flags(false, false, false, false, true, true, false)),
    /* sunrise */                (Some("Civil Twilight"), Direction::Rise, flags(false, false, false, false, true, true, false)),
    /* sunriseEnd */             (Some("Day"), Direction::Rise, flags(true, false, false, false, false, true, false)),
    /* morningGoldenHourEnd */   (Some("Day"), Direction::Rise, flags(true, false, false, false, false, false, false)),
    /* solarNoon */              (None, Direction::Fall, None),
    /* eveningGoldenHourStart */ (Some("Day"), Direction::Fall, flags(true, false, false, false, false, false, true)),
    /* sunsetStart */            (Some("Day"), Direction::Fall, flags(true, false, false, false, false, false, true)),
    /* sunset */                 (Some("Civil Twilight"), Direction::Fall, flags(false, false, false, false, true, false, true)),
    /* civilDusk */              (Some("Nautical Twilight"), Direction::Fall, flags(false, false, false, true, false, false, false)),
    /* nauticalDusk */           (Some("Astronomical Twilight"), Direction::Fall, flags(false, false, true, false, false, false, false)),
    /* nightStart */             (Some("Night"), Direction::Fall, flags(false, true, false, false, false, false, false)),
    /* nadir */                  (None, Direction::Rise, None),
];

impl SolarState {
    fn apply(&mut self, event: SolarEvent) {
        let (label, direction, flags) = TRANSITIONS[event.index()];
        if let Some(label) = label {
            self.state = Some(label.to_string());
        }
        self.direction = Some(direction);
        if let Some(f) = flags {
            self.day = f.day;
            self.night = f.night;
            self.astrological_twilight = f.astronomical;
            self.nautical_twilight = f.nautical;
            self.civil_twilight = f.civil;
            self.golden_hour = f.morning_golden || f.evening_golden;
            self.twilight = f.astronomical || f.nautical || f.civil;
        }
    }

    fn finish(&mut self) {
        let rising = self.direction == Some(Direction::Rise);
        let falling = self.direction == Some(Direction::Fall);
        self.morning_twilight = rising && self.twilight;
        self.evening_twilight = falling && self.twilight;
        self.dawn = rising && self.civil_twilight;
        self.dusk = falling && self.civil_twilight;
        self.morning_golden_hour = rising && self.golden_hour;
        self.evening_golden_hour = falling && self.golden_hour;
    }

    /// Fold the events that happened before `now` (sorted by raw time)
    fn from_past(sorted: &[SolarEventTime], now: DateTime<Utc>) -> Self {
        let mut state = SolarState::default();
        for event in sorted.iter().take_while(|e| e.time < now) {
            state.apply(event.event);
        }
        state.finish();
        state
    }
}

fn midday(instant: DateTime<Utc>) -> DateTime<Utc> {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default();
    instant.date_naive().and_time(noon).and_utc()
}

/// Compute bracketing events around `now` for `requested` events at `position`.
///
/// Every event time is shifted by `offset_minutes` before being compared with
/// `now`. `elevation` is accepted for observer-height correction but not
/// applied yet. Returns `None` when `requested` is empty.
pub fn solar_timeline(
    position: &Coordinates,
    _elevation: f64,
    requested: &[SolarEvent],
    now: DateTime<Utc>,
    offset_minutes: i64,
) -> Option<SolarTimes> {
    if requested.is_empty() {
        return None;
    }

    let offset = Duration::minutes(offset_minutes);
    let mut found: Vec<SolarEventTime> = Vec::with_capacity(SolarEvent::ALL.len() * 2);

    let mut pending_past: Vec<SolarEvent> = SolarEvent::ALL.to_vec();
    let mut scan_day = midday(now) + Duration::days(1);
    for _ in 0..BACKWARD_SCAN_DAYS {
        if pending_past.is_empty() {
            break;
        }
        let times = sun_times(scan_day, position.latitude, position.longitude);
        pending_past.retain(|event| match times.get(*event) {
            Some(time) if time + offset <= now => {
                found.push(SolarEventTime {
                    event: *event,
                    time,
                    time_offset: time + offset,
                });
                false
            }
            _ => true,
        });
        scan_day -= Duration::days(1);
    }

    let mut pending_future: Vec<SolarEvent> = SolarEvent::ALL.to_vec();
    let mut scan_day = midday(now) - Duration::days(1);
    for _ in 0..FORWARD_SCAN_DAYS {
        if pending_future.is_empty() {
            break;
        }
        let times = sun_times(scan_day, position.latitude, position.longitude);
        pending_future.retain(|event| match times.get(*event) {
            Some(time) if time + offset > now => {
                found.push(SolarEventTime {
                    event: *event,
                    time,
                    time_offset: time + offset,
                });
                false
            }
            _ => true,
        });
        scan_day += Duration::days(1);
    }

    found.sort_by_key(|e| e.time);

    let solar_state = SolarState::from_past(&found, now);

    let event_times: Vec<SolarEventTime> = found
        .into_iter()
        .filter(|e| e.time_offset >= now && requested.contains(&e.event))
        .collect();
    let next = event_times.first().copied();

    Some(SolarTimes {
        solar_state,
        next_event: next.map(|e| e.event),
        next_event_time: next.map(|e| e.time),
        next_event_time_offset: next.map(|e| e.time_offset),
        event_times,
    })
}
