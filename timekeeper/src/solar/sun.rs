//! Raw sun event instants for one day at one location.
//!
//! Standard low-precision solar position model (mean anomaly, equation of
//! centre, declination, hour angle). Accurate to about a minute, which is
//! the resolution the scheduler needs.

use super::SolarEvent;
use chrono::{DateTime, Utc};
use std::f64::consts::PI;

const RAD: f64 = PI / 180.0;
const DAY_MS: f64 = 1000.0 * 60.0 * 60.0 * 24.0;
const J1970: f64 = 2_440_588.0;
const J2000: f64 = 2_451_545.0;
const J0: f64 = 0.0009;
const OBLIQUITY: f64 = RAD * 23.4397;

/// Sun altitude (degrees) paired with the rising and setting events it defines
const ANGLE_EVENTS: [(f64, SolarEvent, SolarEvent); 6] = [
    (-0.833, SolarEvent::Sunrise, SolarEvent::Sunset),
    (-0.3, SolarEvent::SunriseEnd, SolarEvent::SunsetStart),
    (-6.0, SolarEvent::CivilDawn, SolarEvent::CivilDusk),
    (-12.0, SolarEvent::NauticalDawn, SolarEvent::NauticalDusk),
    (-18.0, SolarEvent::NightEnd, SolarEvent::NightStart),
    (6.0, SolarEvent::MorningGoldenHourEnd, SolarEvent::EveningGoldenHourStart),
];

/// Event instants for one solar day; `None` where the sun never reaches the angle
#[derive(Debug, Clone, Default)]
pub struct SunTimes {
    times: [Option<DateTime<Utc>>; 14],
}

impl SunTimes {
    pub fn get(&self, event: SolarEvent) -> Option<DateTime<Utc>> {
        self.times[event.index()]
    }
}

fn to_julian(instant: DateTime<Utc>) -> f64 {
    instant.timestamp_millis() as f64 / DAY_MS - 0.5 + J1970
}

fn from_julian(j: f64) -> Option<DateTime<Utc>> {
    if !j.is_finite() {
        return None;
    }
    let millis = ((j + 0.5 - J1970) * DAY_MS).round();
    DateTime::from_timestamp_millis(millis as i64)
}

fn declination(l: f64) -> f64 {
    (l.sin() * OBLIQUITY.sin()).asin()
}

fn solar_mean_anomaly(d: f64) -> f64 {
    RAD * (357.5291 + 0.985_600_28 * d)
}

fn ecliptic_longitude(m: f64) -> f64 {
    let centre = RAD * (1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin());
    let perihelion = RAD * 102.9372;
    m + centre + perihelion + PI
}

fn julian_cycle(d: f64, lw: f64) -> f64 {
    (d - J0 - lw / (2.0 * PI)).round()
}

fn approx_transit(ht: f64, lw: f64, n: f64) -> f64 {
    J0 + (ht + lw) / (2.0 * PI) + n
}

fn solar_transit_j(ds: f64, m: f64, l: f64) -> f64 {
    J2000 + ds + 0.0053 * m.sin() - 0.0069 * (2.0 * l).sin()
}

fn hour_angle(h: f64, phi: f64, dec: f64) -> f64 {
    ((h.sin() - phi.sin() * dec.sin()) / (phi.cos() * dec.cos())).acos()
}

/// Compute the events of the solar cycle nearest `date`. Pass midday of the
/// wanted UTC day to get that day's cycle.
pub fn sun_times(date: DateTime<Utc>, latitude: f64, longitude: f64) -> SunTimes {
    let lw = RAD * -longitude;
    let phi = RAD * latitude;

    let d = to_julian(date) - J2000;
    let n = julian_cycle(d, lw);
    let ds = approx_transit(0.0, lw, n);

    let m = solar_mean_anomaly(ds);
    let l = ecliptic_longitude(m);
    let dec = declination(l);

    let j_noon = solar_transit_j(ds, m, l);

    let mut times = SunTimes::default();
    times.times[SolarEvent::SolarNoon.index()] = from_julian(j_noon);
    times.times[SolarEvent::Nadir.index()] = from_julian(j_noon - 0.5);

    for (angle, rise, set) in ANGLE_EVENTS {
        let w = hour_angle(angle * RAD, phi, dec);
        if w.is_nan() {
            continue;
        }
        let a = approx_transit(w, lw, n);
        let j_set = solar_transit_j(a, m, l);
        let j_rise = j_noon - (j_set - j_noon);
        times.times[rise.index()] = from_julian(j_rise);
        times.times[set.index()] = from_julian(j_set);
    }

    times
}
