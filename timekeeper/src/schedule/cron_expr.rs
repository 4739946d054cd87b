use super::timezone::ScheduleTimeZone;
use chrono::{DateTime, Local, Utc};
use cron::Schedule;
use std::str::FromStr;
use tracing::debug;

/// A parsed cron expression.
///
/// Accepts 5-field (minute resolution), 6-field (with seconds) and 7-field
/// (seconds + year) forms plus `@hourly`-style macros. Parsing and next-date
/// iteration are delegated to the `cron` crate.
#[derive(Debug, Clone)]
pub struct CronExpression {
    source: String,
    schedule: Schedule,
}

impl CronExpression {
    pub fn parse(expression: &str) -> Result<Self, String> {
        let normalized = normalize(expression)?;
        let schedule = Schedule::from_str(&normalized)
            .map_err(|e| format!("Invalid cron expression '{}': {}", expression, e))?;
        debug!("Parsed cron '{}' as '{}'", expression, normalized);
        Ok(Self {
            source: expression.trim().to_string(),
            schedule,
        })
    }

    pub fn is_valid(expression: &str) -> bool {
        Self::parse(expression).is_ok()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// First occurrence strictly after `after`, evaluated in `zone`
    pub fn next_after(&self, after: DateTime<Utc>, zone: &ScheduleTimeZone) -> Option<DateTime<Utc>> {
        self.upcoming(after, 1, zone).into_iter().next()
    }

    /// Up to `count` occurrences strictly after `after`
    pub fn upcoming(
        &self,
        after: DateTime<Utc>,
        count: usize,
        zone: &ScheduleTimeZone,
    ) -> Vec<DateTime<Utc>> {
        match zone {
            ScheduleTimeZone::Named(tz) => self
                .schedule
                .after(&after.with_timezone(tz))
                .take(count)
                .map(|dt| dt.with_timezone(&Utc))
                .collect(),
            ScheduleTimeZone::Local => self
                .schedule
                .after(&after.with_timezone(&Local))
                .take(count)
                .map(|dt| dt.with_timezone(&Utc))
                .collect(),
        }
    }
}

/// Bring an expression into the 6/7-field dialect the `cron` crate parses
pub(crate) fn normalize(expression: &str) -> Result<String, String> {
    let trimmed = expression.trim();
    if trimmed.starts_with('@') {
        return Ok(trimmed.to_string());
    }

    let mut fields: Vec<String> = trimmed
        .split_whitespace()
        .map(|field| if field == "?" { "*".to_string() } else { field.to_string() })
        .collect();

    match fields.len() {
        5 => fields.insert(0, "0".to_string()),
        6 | 7 => {}
        n => {
            return Err(format!(
                "Cron expression requires 5, 6 or 7 fields. Got {} fields: '{}'",
                n, trimmed
            ))
        }
    }

    fields[5] = day_of_week_names(&fields[5]);
    Ok(fields.join(" "))
}

/// Numeric day-of-week values follow Unix numbering (0 or 7 = Sunday); the
/// `cron` crate numbers from 1 = Sunday, so numbers are rewritten as names.
fn day_of_week_names(field: &str) -> String {
    const NAMES: [&str; 8] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

    let mut out = String::with_capacity(field.len() + 8);
    let mut digits = String::new();
    let mut after_step = false;

    let flush = |digits: &mut String, out: &mut String, after_step: bool| {
        if digits.is_empty() {
            return;
        }
        match digits.parse::<usize>() {
            Ok(n) if !after_step && n < NAMES.len() => out.push_str(NAMES[n]),
            _ => out.push_str(digits),
        }
        digits.clear();
    };

    for ch in field.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        flush(&mut digits, &mut out, after_step);
        match ch {
            '/' => after_step = true,
            ',' => after_step = false,
            _ => {}
        }
        out.push(ch);
    }
    flush(&mut digits, &mut out, after_step);
    out
}

/// Loose check used to stop cron expressions from being read as date lists
pub fn is_cron_like(token: &str) -> bool {
    if token.contains('*') {
        return true;
    }
    let parts = token.split_whitespace().count();
    (4..=6).contains(&parts)
}
