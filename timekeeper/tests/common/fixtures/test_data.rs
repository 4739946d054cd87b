//! Common test data and spec builders

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use timekeeper::{InputMessage, ScheduleSpec, ScheduleTimeZone, TaskRegistry};

/// Common schedule names
pub mod names {
    pub const MORNING: &str = "morning";
    pub const HOURLY: &str = "hourly";
    pub const TICKER: &str = "ticker";
    pub const ONCE: &str = "once";
    pub const DUSK: &str = "dusk";
}

/// Common expressions
pub mod expressions {
    pub const EVERY_SECOND: &str = "* * * * * *";
    pub const EVERY_MINUTE: &str = "0 * * * * * *";
    pub const HOURLY: &str = "0 0 * * * *";
    pub const WEEKDAY_MORNING: &str = "0 30 7 * * 1-5";
}

/// Common locations
pub mod locations {
    pub const EQUATOR: &str = "0,0";
    pub const GREENWICH: &str = "51.4769,-0.0005";
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn spec(value: Value) -> ScheduleSpec {
    serde_json::from_value(value).expect("valid spec json")
}

pub fn cron_spec(name: &str, expression: &str) -> ScheduleSpec {
    spec(json!({"name": name, "expressionType": "cron", "expression": expression}))
}

pub fn limited_cron_spec(name: &str, expression: &str, limit: u64) -> ScheduleSpec {
    spec(json!({"name": name, "expressionType": "cron", "expression": expression, "limit": limit}))
}

/// Dates spec with a single instant `offset_ms` from `from`
pub fn one_shot_spec(name: &str, from: DateTime<Utc>, offset_ms: i64) -> ScheduleSpec {
    let at = (from + Duration::milliseconds(offset_ms)).timestamp_millis();
    spec(json!({"name": name, "expressionType": "dates", "expression": [at]}))
}

pub fn solar_spec(name: &str, location: &str, events: &str) -> ScheduleSpec {
    spec(json!({
        "name": name,
        "expressionType": "solar",
        "location": location,
        "solarType": "selected",
        "solarEvents": events,
    }))
}

pub fn utc_registry() -> TaskRegistry {
    TaskRegistry::new(ScheduleTimeZone::parse(Some("UTC")).expect("UTC zone"))
}

pub fn command(payload: Value) -> InputMessage {
    InputMessage {
        topic: None,
        payload,
    }
}

pub fn control(topic: &str, payload: Value) -> InputMessage {
    InputMessage {
        topic: Some(topic.to_string()),
        payload,
    }
}

/// Deliver the next due fire of `name`, settling it the way the scheduler does
pub fn fire_once(registry: &mut TaskRegistry, name: &str) -> bool {
    let Some(task) = registry.get_mut(name) else {
        return false;
    };
    let Some(due) = task.next_fire() else {
        return false;
    };
    match task.fire(due) {
        Some(outcome) => {
            if outcome.settle {
                task.settle();
            }
            true
        }
        None => false,
    }
}
