//! Human-readable schedule descriptions and next-fire previews
//!
//! `describe_expression` is pure: it never registers or arms anything, so it
//! backs both the `describe` command and the status of existing tasks.

use crate::constants::defaults::PREVIEW_DATES;
use crate::schedule::cron_expr::normalize;
use crate::schedule::{
    CronExpression, DateSequence, ScheduleExpression, ScheduleSpec, ScheduleTimeZone, SolarType,
};
use crate::solar::{
    parse_location, solar_timeline, SolarEvent, SolarEventTime, SolarState,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const INVALID_EXPRESSION: &str = "Invalid expression";
pub const NEVER: &str = "Never";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    pub description: String,
    pub next_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_dates: Option<Vec<DateTime<Utc>>>,
    pub pretty_next: String,
    pub next_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solar_state: Option<SolarState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solar_state_offset: Option<SolarState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_event: Option<SolarEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_event_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_event_time_offset: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_times: Option<Vec<SolarEventTime>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl Description {
    fn invalid() -> Self {
        Self {
            description: INVALID_EXPRESSION.to_string(),
            pretty_next: NEVER.to_string(),
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.description != INVALID_EXPRESSION
    }
}

/// Describe a cron, dates or solar spec as of `now`.
///
/// For solar specs with a non-zero offset and `include_offset_state`, the
/// sky state at `now - offset` is reported as `solarStateOffset`.
pub fn describe_expression(
    spec: &ScheduleSpec,
    zone: &ScheduleTimeZone,
    now: DateTime<Utc>,
    include_offset_state: bool,
) -> Description {
    match spec.expression_type.as_str() {
        "solar" => describe_solar(spec, now, include_offset_state),
        "dates" => match &spec.expression {
            Some(expression) => describe_dates(expression, zone, now),
            None => Description::invalid(),
        },
        _ => {
            let text = spec.expression.as_ref().and_then(ScheduleExpression::as_text);
            match (text, &spec.expression) {
                (Some(text), _) if CronExpression::is_valid(text) => describe_cron(text, zone, now),
                (_, Some(expression)) if spec.expression_type.is_empty() => {
                    describe_dates(expression, zone, now)
                }
                _ => Description::invalid(),
            }
        }
    }
}

fn describe_cron(text: &str, zone: &ScheduleTimeZone, now: DateTime<Utc>) -> Description {
    let Ok(expression) = CronExpression::parse(text) else {
        return Description::invalid();
    };
    let next_dates = expression.upcoming(now, PREVIEW_DATES, zone);
    let next_date = next_dates.first().copied();
    let pretty_next = next_date
        .map(|next| format!("in {}", pretty_duration((next - now).num_milliseconds())))
        .unwrap_or_else(|| NEVER.to_string());

    Description {
        description: humanize_cron(text),
        next_date,
        next_dates: next_date.map(|_| next_dates),
        next_description: next_date.map(|_| pretty_next.clone()),
        pretty_next,
        ..Default::default()
    }
}

fn describe_dates(
    expression: &ScheduleExpression,
    zone: &ScheduleTimeZone,
    now: DateTime<Utc>,
) -> Description {
    let Ok(sequence) = DateSequence::parse(expression, zone) else {
        return Description::invalid();
    };
    let future = sequence.upcoming(now);
    let Some(&next) = future.first() else {
        return Description {
            description: "Date sequence with fixed dates".to_string(),
            pretty_next: NEVER.to_string(),
            ..Default::default()
        };
    };

    let description = if future.len() == 1 {
        format!("One time at {}", zone.format_short(next))
    } else {
        format!(
            "{} Date Sequences starting at {}",
            future.len(),
            zone.format_short(next)
        )
    };
    let pretty_next = format!("in {}", pretty_duration((next - now).num_milliseconds()));

    Description {
        description,
        next_date: Some(next),
        next_dates: Some(future.iter().copied().take(PREVIEW_DATES).collect()),
        next_description: Some(pretty_next.clone()),
        pretty_next,
        ..Default::default()
    }
}

fn describe_solar(spec: &ScheduleSpec, now: DateTime<Utc>, include_offset_state: bool) -> Description {
    let Ok(position) = parse_location(&spec.location) else {
        return Description::invalid();
    };
    let all = spec.solar_type.parse::<SolarType>() == Ok(SolarType::All);
    let events = if all {
        SolarEvent::ALL.to_vec()
    } else {
        spec.solar_events
            .as_ref()
            .map(|list| SolarEvent::from_names(&list.names()))
            .unwrap_or_default()
    };
    let Some(times) = solar_timeline(&position, 0.0, &events, now, spec.offset) else {
        return Description::invalid();
    };

    let solar_state_offset = if include_offset_state && spec.offset != 0 {
        let shifted = now - Duration::minutes(spec.offset);
        solar_timeline(&position, 0.0, &events, shifted, 0).map(|t| t.solar_state)
    } else {
        None
    };

    let description = if all {
        "All Solar Events".to_string()
    } else {
        let names: Vec<&str> = events.iter().map(|e| e.as_str()).collect();
        format!("Solar Events: '{}'", names.join(", "))
    };

    let next_date = times.next_event_time_offset;
    let pretty_next = match (times.next_event, next_date) {
        (Some(event), Some(next)) => format!(
            "{} in {}",
            event,
            pretty_duration((next - now).num_milliseconds())
        ),
        _ => NEVER.to_string(),
    };

    Description {
        description,
        next_date,
        next_dates: None,
        next_description: next_date.map(|_| pretty_next.clone()),
        pretty_next,
        solar_state: Some(times.solar_state),
        solar_state_offset,
        next_event: times.next_event,
        next_event_time: times.next_event_time,
        next_event_time_offset: times.next_event_time_offset,
        event_times: Some(times.event_times),
        offset: Some(spec.offset),
    }
}

/// Short English rendering of a cron expression, e.g. "Every minute"
pub fn humanize_cron(expression: &str) -> String {
    let trimmed = expression.trim();
    match trimmed {
        "@yearly" | "@annually" => return "Every year".to_string(),
        "@monthly" => return "Every month".to_string(),
        "@weekly" => return "Every week".to_string(),
        "@daily" | "@midnight" => return "Every day".to_string(),
        "@hourly" => return "Every hour".to_string(),
        _ => {}
    }
    let Ok(normalized) = normalize(trimmed) else {
        return INVALID_EXPRESSION.to_string();
    };
    let fields: Vec<&str> = normalized.split_whitespace().collect();
    if fields.len() < 6 {
        return INVALID_EXPRESSION.to_string();
    }

    let mut text = time_of_day(fields[0], fields[1], fields[2]);
    if fields[3] != "*" {
        text.push_str(&format!(", on day {} of the month", fields[3]));
    }
    if fields[5] != "*" {
        text.push_str(&format!(", only on {}", fields[5]));
    }
    if fields[4] != "*" {
        text.push_str(&format!(", only in {}", fields[4]));
    }
    if let Some(year) = fields.get(6).filter(|y| **y != "*") {
        text.push_str(&format!(", only in {}", year));
    }
    text
}

fn time_of_day(second: &str, minute: &str, hour: &str) -> String {
    let step = |field: &str| {
        field
            .strip_prefix("*/")
            .or_else(|| field.strip_prefix("0/"))
            .and_then(|n| n.parse::<u32>().ok())
    };
    let fixed = |field: &str| field.parse::<u32>().ok();
    let every = |n: u32, unit: &str| {
        if n == 1 {
            format!("Every {}", unit)
        } else {
            format!("Every {} {}s", n, unit)
        }
    };

    let zero_second = fixed(second) == Some(0);
    match (second, minute, hour) {
        ("*", "*", "*") => "Every second".to_string(),
        (s, "*", "*") if step(s).is_some() => every(step(s).unwrap_or(1), "second"),
        (_, "*", "*") if zero_second => "Every minute".to_string(),
        (_, m, "*") if zero_second && step(m).is_some() => every(step(m).unwrap_or(1), "minute"),
        (_, m, "*") if zero_second && fixed(m) == Some(0) => "Every hour".to_string(),
        (_, m, "*") if zero_second && fixed(m).is_some() => {
            format!("At {} minutes past the hour", m)
        }
        (_, m, h) if zero_second && fixed(m) == Some(0) && step(h).is_some() => {
            every(step(h).unwrap_or(1), "hour")
        }
        (s, m, h) => match (fixed(s), fixed(m), fixed(h)) {
            (Some(0), Some(m), Some(h)) => format!("At {:02}:{:02}", h, m),
            (Some(s), Some(m), Some(h)) => format!("At {:02}:{:02}:{:02}", h, m, s),
            _ => {
                let part = |field: &str, unit: &str| {
                    if field == "*" {
                        format!("every {}", unit)
                    } else {
                        format!("{} {}", unit, field)
                    }
                };
                format!(
                    "At {}, {}, {}",
                    part(s, "second"),
                    part(m, "minute"),
                    part(h, "hour")
                )
            }
        },
    }
}

/// Verbose duration, e.g. "1 day 2 hours 5 seconds"
pub fn pretty_duration(millis: i64) -> String {
    let sign = if millis < 0 { "-" } else { "" };
    let millis = millis.unsigned_abs();
    let unit = |n: u64, name: &str| {
        if n == 1 {
            format!("{} {}", n, name)
        } else {
            format!("{} {}s", n, name)
        }
    };

    if millis < 1000 {
        return format!("{}{}", sign, unit(millis, "millisecond"));
    }

    let total = millis / 1000;
    let parts: Vec<String> = [
        (total / 86_400, "day"),
        (total % 86_400 / 3_600, "hour"),
        (total % 3_600 / 60, "minute"),
        (total % 60, "second"),
    ]
    .into_iter()
    .filter(|(n, _)| *n > 0)
    .map(|(n, name)| unit(n, name))
    .collect();

    format!("{}{}", sign, parts.join(" "))
}
