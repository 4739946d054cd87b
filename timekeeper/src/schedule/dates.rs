use super::cron_expr::is_cron_like;
use super::timezone::ScheduleTimeZone;
use super::ScheduleExpression;
use crate::errors::ParseError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Sorted, de-duplicated list of fixed instants
#[derive(Debug, Clone, PartialEq)]
pub struct DateSequence {
    dates: Vec<DateTime<Utc>>,
}

impl DateSequence {
    pub fn from_instants(mut dates: Vec<DateTime<Utc>>) -> Self {
        dates.sort();
        dates.dedup();
        Self { dates }
    }

    /// Parse a CSV string or an array of date-like values.
    ///
    /// CSV entries that look like cron fields are refused so a mistyped cron
    /// expression is never silently treated as a date list.
    pub fn parse(
        expression: &ScheduleExpression,
        zone: &ScheduleTimeZone,
    ) -> Result<Self, ParseError> {
        let dates = match expression {
            ScheduleExpression::Text(text) => {
                let tokens: Vec<&str> = text.split(',').map(str::trim).collect();
                if let Some(token) = tokens.iter().find(|t| is_cron_like(t)) {
                    return Err(ParseError::Date {
                        input: token.to_string(),
                    });
                }
                tokens
                    .into_iter()
                    .map(|token| parse_date_token(token, zone))
                    .collect::<Result<Vec<_>, _>>()?
            }
            ScheduleExpression::List(items) => items
                .iter()
                .map(|item| parse_date_value(item, zone))
                .collect::<Result<Vec<_>, _>>()?,
        };

        if dates.is_empty() {
            return Err(ParseError::Date {
                input: expression.to_string(),
            });
        }
        Ok(Self::from_instants(dates))
    }

    pub fn is_date_sequence(expression: &ScheduleExpression) -> bool {
        Self::parse(expression, &ScheduleTimeZone::default()).is_ok()
    }

    pub fn dates(&self) -> &[DateTime<Utc>] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// First date at or after `from`
    pub fn next_from(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let idx = self.dates.partition_point(|d| *d < from);
        self.dates.get(idx).copied()
    }

    /// First date strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let idx = self.dates.partition_point(|d| *d <= after);
        self.dates.get(idx).copied()
    }

    /// Dates at or after `from`, oldest first
    pub fn upcoming(&self, from: DateTime<Utc>) -> &[DateTime<Utc>] {
        let idx = self.dates.partition_point(|d| *d < from);
        &self.dates[idx..]
    }
}

fn parse_date_value(value: &Value, zone: &ScheduleTimeZone) -> Result<DateTime<Utc>, ParseError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| ParseError::Date {
                input: n.to_string(),
            }),
        Value::String(s) => parse_date_token(s, zone),
        other => Err(ParseError::Date {
            input: other.to_string(),
        }),
    }
}

/// Parse one date token: epoch milliseconds, RFC 3339, RFC 2822, a naive
/// date-time (read in `zone`) or a bare date (UTC midnight).
pub fn parse_date_token(token: &str, zone: &ScheduleTimeZone) -> Result<DateTime<Utc>, ParseError> {
    let token = token.trim();
    let fail = || ParseError::Date {
        input: token.to_string(),
    };

    if token.is_empty() {
        return Err(fail());
    }
    if let Ok(millis) = token.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis).ok_or_else(fail);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(token) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(token, format) {
            return zone.localize(naive).ok_or_else(fail);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(fail)?;
        return Ok(Utc.from_utc_datetime(&midnight));
    }
    Err(fail())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn utc(zone: &str) -> ScheduleTimeZone {
        ScheduleTimeZone::parse(Some(zone)).unwrap()
    }

    #[test]
    fn test_csv_sorted_and_deduplicated() {
        let expr = ScheduleExpression::from(
            "2030-01-02T00:00:00Z, 2030-01-01T00:00:00Z, 2030-01-02T00:00:00Z",
        );
        let seq = DateSequence::parse(&expr, &utc("UTC")).unwrap();
        assert_eq!(seq.len(), 2);
        assert!(seq.dates()[0] < seq.dates()[1]);
    }

    #[test]
    fn test_array_of_mixed_values() {
        let expr: ScheduleExpression =
            serde_json::from_value(json!([1893456000000i64, "2030-01-01 12:30"])).unwrap();
        let seq = DateSequence::parse(&expr, &utc("UTC")).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.dates()[0].timestamp_millis(), 1893456000000);
        assert_eq!(seq.dates()[1].to_rfc3339(), "2030-01-01T12:30:00+00:00");
    }

    #[test]
    fn test_cron_like_entries_rejected() {
        let expr = ScheduleExpression::from("0 0 * * *");
        assert!(DateSequence::parse(&expr, &utc("UTC")).is_err());
        assert!(!DateSequence::is_date_sequence(&expr));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(!DateSequence::is_date_sequence(&ScheduleExpression::from("tomorrow")));
        assert!(!DateSequence::is_date_sequence(&ScheduleExpression::List(vec![])));
    }

    #[test]
    fn test_next_lookups() {
        let expr = ScheduleExpression::from("1000,2000,3000");
        let seq = DateSequence::parse(&expr, &utc("UTC")).unwrap();
        let at = |ms| DateTime::from_timestamp_millis(ms).unwrap();

        assert_eq!(seq.next_from(at(2000)), Some(at(2000)));
        assert_eq!(seq.next_after(at(2000)), Some(at(3000)));
        assert_eq!(seq.next_after(at(3000)), None);
        assert_eq!(seq.upcoming(at(1500)).len(), 2);
    }
}
