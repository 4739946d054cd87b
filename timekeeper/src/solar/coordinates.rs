use crate::errors::ParseError;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const FLOAT: &str = r"(-?\d+(?:\.\d+)?)";
const WS: &str = r"\s*";
const SEPARATOR: &str = r"[,;\s]*";
const DIRECTION: &str = r"([NSEW]?)";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

fn dms_token() -> String {
    let deg = format!("{}{}[°º:d]?", FLOAT, WS);
    let min = format!("{}{}['’‘′:]", FLOAT, WS);
    let sec = format!("{}{}(?:\"|″|’’|''|”|“)?", FLOAT, WS);
    format!("{deg}(?:{WS}{min})?(?:{WS}{sec})?")
}

fn compile(pattern: &str, input: &str) -> Result<Regex, ParseError> {
    Regex::new(pattern).map_err(|e| ParseError::Coordinate {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a free-text location into latitude/longitude.
///
/// Accepts decimal pairs ("51.47, -0.0014", "51.47 -0.0014") and
/// degree/minute/second forms with cardinal letters before or after
/// ("51°28'40\"N 0°0'5\"W", "N51.47 W0.0014").
pub fn parse_location(input: &str) -> Result<Coordinates, ParseError> {
    let text = input.trim();
    let fail = |reason: &str| ParseError::Coordinate {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let dms = dms_token();
    let single = compile(&format!("^{}$", FLOAT), input)?;
    let pair = compile(&format!("^{FLOAT}{SEPARATOR}{FLOAT}$"), input)?;
    let suffixed = compile(
        &format!("(?i)^{dms}{WS}{DIRECTION}(?:{SEPARATOR}{dms}{WS}{DIRECTION})?$"),
        input,
    )?;
    let prefixed = compile(
        &format!("(?i)^{DIRECTION}{WS}{dms}(?:{SEPARATOR}{DIRECTION}{WS}{dms})?$"),
        input,
    )?;

    if single.is_match(text) {
        return Err(fail("a single number is not a location"));
    }

    let mut latitude = None;
    let mut longitude = None;

    if let Some(caps) = pair.captures(text) {
        latitude = Some(float_at(&caps, 1).ok_or_else(|| fail("invalid latitude"))?);
        longitude = Some(float_at(&caps, 2).ok_or_else(|| fail("invalid longitude"))?);
    } else if let Some(caps) = suffixed.captures(text) {
        let (first, second) = normalize_cardinality(group(&caps, 4), group(&caps, 8));
        place(&caps, [1, 2, 3], first, &mut latitude, &mut longitude, input)?;
        place(&caps, [5, 6, 7], second, &mut latitude, &mut longitude, input)?;
    } else if let Some(caps) = prefixed.captures(text) {
        let (first, second) = normalize_cardinality(group(&caps, 1), group(&caps, 5));
        place(&caps, [2, 3, 4], first, &mut latitude, &mut longitude, input)?;
        place(&caps, [6, 7, 8], second, &mut latitude, &mut longitude, input)?;
    } else {
        return Err(fail("unrecognised format"));
    }

    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Ok(Coordinates {
            latitude,
            longitude,
        }),
        (None, _) => Err(fail("latitude missing")),
        (_, None) => Err(fail("longitude missing")),
    }
}

fn group<'t>(caps: &Captures<'t>, idx: usize) -> &'t str {
    caps.get(idx).map(|m| m.as_str()).unwrap_or("")
}

fn float_at(caps: &Captures<'_>, idx: usize) -> Option<f64> {
    caps.get(idx).and_then(|m| m.as_str().parse().ok())
}

/// Missing letters default to N then E, or to the axis the other letter leaves free
fn normalize_cardinality(a: &str, b: &str) -> (char, char) {
    let a = a.to_ascii_lowercase().chars().next();
    let b = b.to_ascii_lowercase().chars().next();
    let other = |c: char| if c == 'n' || c == 's' { 'e' } else { 'n' };
    match (a, b) {
        (None, None) => ('n', 'e'),
        (Some(a), None) => (a, other(a)),
        (None, Some(b)) => (other(b), b),
        (Some(a), Some(b)) => (a, b),
    }
}

fn place(
    caps: &Captures<'_>,
    [deg, min, sec]: [usize; 3],
    cardinality: char,
    latitude: &mut Option<f64>,
    longitude: &mut Option<f64>,
    input: &str,
) -> Result<(), ParseError> {
    let Some(degrees) = float_at(caps, deg) else {
        return Ok(());
    };
    let minutes = float_at(caps, min).unwrap_or(0.0);
    let seconds = float_at(caps, sec).unwrap_or(0.0);
    let value = dms_to_decimal(degrees, minutes, seconds).map_err(|reason| {
        ParseError::Coordinate {
            input: input.to_string(),
            reason,
        }
    })?;

    match cardinality {
        'e' => *longitude = Some(value),
        'w' => *longitude = Some(-value),
        's' => *latitude = Some(-value),
        _ => *latitude = Some(value),
    }
    Ok(())
}

fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> Result<f64, String> {
    if !(0.0..=60.0).contains(&minutes) {
        return Err("Minutes out of range".to_string());
    }
    if !(0.0..=60.0).contains(&seconds) {
        return Err("Seconds out of range".to_string());
    }
    let sign = if degrees < 0.0 { -1.0 } else { 1.0 };
    Ok(degrees + sign * minutes / 60.0 + sign * seconds / 3600.0)
}
