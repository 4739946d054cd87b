//! Schedule specifications and their resolution into timing drivers
//!
//! A schedule is one of three trigger models:
//! - **cron**: recurring expression (5, 6 or 7 fields, seconds and year optional)
//! - **dates**: a fixed list of instants (CSV string or array)
//! - **solar**: sun events computed for a location, optionally offset in minutes
//!
//! # Configuration
//!
//! ```toml
//! [[schedules]]
//! name = "morning"
//! expressionType = "solar"
//! location = "51.47, -0.00"
//! solarType = "selected"
//! solarEvents = "sunrise,civilDawn"
//! offset = -15
//! payloadType = "str"
//! payload = "lights off"
//! ```

pub mod cron_expr;
pub mod dates;
pub mod resolver;
pub mod timezone;
pub mod validation;

pub use cron_expr::CronExpression;
pub use dates::DateSequence;
pub use resolver::{Driver, ExpressionResolver};
pub use timezone::ScheduleTimeZone;
pub use validation::{apply_defaults, validate};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Raw schedule options as supplied by configuration, commands or snapshots.
///
/// String-typed fields are kept loose at the boundary; `validate` turns them
/// into the typed `ExpressionType` / `SolarType` the rest of the crate uses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleSpec {
    pub name: String,
    pub topic: String,
    pub expression_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<ScheduleExpression>,
    pub location: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub offset: i64,
    pub solar_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solar_events: Option<SolarEventList>,
    pub payload_type: String,
    /// Older configurations carried the payload type under `type`
    #[serde(rename = "type", skip_serializing)]
    pub legacy_type: Option<String>,
    pub payload: Value,
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub limit: Option<u64>,
    #[serde(
        deserialize_with = "lenient_opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub count: Option<u64>,
}

impl ScheduleSpec {
    /// Fire limit, 0 meaning unlimited
    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(0)
    }

    pub fn kind(&self) -> Option<ExpressionType> {
        self.expression_type.parse().ok()
    }
}

/// A cron/dates expression: either one string (cron or CSV of dates) or an array of date-like values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ScheduleExpression {
    Text(String),
    List(Vec<Value>),
}

impl ScheduleExpression {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ScheduleExpression::Text(text) => Some(text.as_str()),
            ScheduleExpression::List(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ScheduleExpression::Text(text) => text.trim().is_empty(),
            ScheduleExpression::List(items) => items.is_empty(),
        }
    }
}

impl fmt::Display for ScheduleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleExpression::Text(text) => write!(f, "{}", text),
            ScheduleExpression::List(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl From<&str> for ScheduleExpression {
    fn from(text: &str) -> Self {
        ScheduleExpression::Text(text.to_string())
    }
}

/// Requested solar events, CSV string or array of names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SolarEventList {
    Csv(String),
    List(Vec<String>),
}

impl SolarEventList {
    /// Trimmed, non-empty entry names in the order given
    pub fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            SolarEventList::Csv(csv) => csv.split(',').collect(),
            SolarEventList::List(list) => list.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn to_csv(&self) -> String {
        self.names().join(",")
    }
}

impl From<&str> for SolarEventList {
    fn from(csv: &str) -> Self {
        SolarEventList::Csv(csv.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionType {
    Cron,
    Dates,
    Solar,
}

impl ExpressionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionType::Cron => "cron",
            ExpressionType::Dates => "dates",
            ExpressionType::Solar => "solar",
        }
    }
}

impl FromStr for ExpressionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cron" => Ok(ExpressionType::Cron),
            "dates" => Ok(ExpressionType::Dates),
            "solar" => Ok(ExpressionType::Solar),
            other => Err(format!("unknown expression type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolarType {
    All,
    Selected,
}

impl FromStr for SolarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(SolarType::All),
            "selected" => Ok(SolarType::Selected),
            other => Err(format!("unknown solar type '{}'", other)),
        }
    }
}

/// Accepts numbers, numeric strings and null (as 0)
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f.trunc() as i64).unwrap_or(0),
        _ => 0,
    })
}

/// Accepts numbers, numeric strings, empty strings and null
fn lenient_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.trunc() as u64)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| *f >= 0.0)
            .map(|f| f.trunc() as u64),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spec_accepts_loose_numbers() {
        let spec: ScheduleSpec = serde_json::from_value(json!({
            "name": "s1",
            "expressionType": "solar",
            "offset": "-15",
            "limit": "3",
            "count": null
        }))
        .unwrap();

        assert_eq!(spec.offset, -15);
        assert_eq!(spec.limit(), 3);
        assert_eq!(spec.count, None);
    }

    #[test]
    fn test_expression_forms() {
        let text: ScheduleExpression = serde_json::from_value(json!("0 * * * * *")).unwrap();
        assert_eq!(text.as_text(), Some("0 * * * * *"));

        let list: ScheduleExpression =
            serde_json::from_value(json!(["2030-01-01T00:00:00Z", 1893456000000u64])).unwrap();
        assert_eq!(list.to_string(), "2030-01-01T00:00:00Z,1893456000000");
    }

    #[test]
    fn test_solar_event_names_trimmed() {
        let list = SolarEventList::from(" sunrise , sunset,");
        assert_eq!(list.names(), vec!["sunrise", "sunset"]);
    }

    #[test]
    fn test_legacy_type_is_read_not_written() {
        let spec: ScheduleSpec =
            serde_json::from_value(json!({"name": "a", "type": "num"})).unwrap();
        assert_eq!(spec.legacy_type.as_deref(), Some("num"));

        let out = serde_json::to_value(&spec).unwrap();
        assert!(out.get("type").is_none());
    }
}
