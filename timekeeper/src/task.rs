//! A named schedule wrapped around one driver
//!
//! Lifecycle: `Stopped` → `Running` → `Finished`. A task that reaches its
//! fire limit (or runs out of fixed dates) is finished but stays registered
//! until removed or replaced. Limit checks are also applied directly from
//! `count`/`limit`, so a task is never reported active once the limit is met,
//! even before the deferred self-stop has run.

use crate::describe::{describe_expression, pretty_duration, Description};
use crate::schedule::{
    Driver, ExpressionType, ScheduleExpression, ScheduleSpec, ScheduleTimeZone, SolarEventList,
};
use crate::schedule::timezone::host_zone_name;
use crate::solar::{SolarEvent, SolarEventTime, SolarState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Stopped,
    Running,
    Finished,
}

#[derive(Debug, Clone)]
pub struct Task {
    id: Uuid,
    spec: ScheduleSpec,
    kind: ExpressionType,
    driver: Driver,
    state: TaskState,
    count: u64,
    limit: u64,
    dynamic: bool,
    modified: bool,
    index: usize,
}

/// What happened when a scheduled fire was delivered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireOutcome {
    pub scheduled: DateTime<Utc>,
    pub count: u64,
    pub solar_event: Option<SolarEvent>,
    /// Limit reached or dates exhausted; the task must be settled next turn
    pub settle: bool,
    /// Solar list must be re-resolved next turn
    pub rearm: bool,
}

/// Exported view of a task, readable back as a `ScheduleSpec`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExport {
    pub topic: String,
    pub name: String,
    pub payload_type: String,
    pub payload: Value,
    pub limit: Option<u64>,
    pub expression_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<ScheduleExpression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solar_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solar_events: Option<SolarEventList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_dynamic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<bool>,
}

/// Live status as reported by status/list/debug and on every fire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    #[serde(rename = "type")]
    pub origin: String,
    pub modified: bool,
    pub is_running: bool,
    pub count: u64,
    pub limit: u64,
    pub next_description: Option<String>,
    pub next_date: Option<DateTime<Utc>>,
    #[serde(rename = "nextDateTZ")]
    pub next_date_tz: Option<String>,
    pub time_zone: String,
    pub server_time: DateTime<Utc>,
    pub server_time_zone: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solar_state: Option<SolarState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solar_state_offset: Option<SolarState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solar_times: Option<Option<Vec<SolarEventTime>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solar_event: Option<SolarEvent>,
}

impl Task {
    pub fn new(
        spec: ScheduleSpec,
        kind: ExpressionType,
        driver: Driver,
        index: usize,
        dynamic: bool,
    ) -> Self {
        let limit = spec.limit();
        Self {
            id: Uuid::new_v4(),
            spec,
            kind,
            driver,
            state: TaskState::Stopped,
            count: 0,
            limit,
            dynamic,
            modified: false,
            index,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn topic(&self) -> &str {
        &self.spec.topic
    }

    pub fn spec(&self) -> &ScheduleSpec {
        &self.spec
    }

    pub fn kind(&self) -> ExpressionType {
        self.kind
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Overwrite the count. A running task whose count reaches its limit
    /// finishes without firing.
    pub fn set_count(&mut self, count: u64) {
        self.count = count;
        if self.state == TaskState::Running && self.limit > 0 && self.count >= self.limit {
            self.state = TaskState::Finished;
            self.driver.disarm();
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn is_static(&self) -> bool {
        !self.dynamic
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }

    pub fn is_finished(&self) -> bool {
        self.state == TaskState::Finished || (self.limit > 0 && self.count >= self.limit)
    }

    pub fn is_active(&self) -> bool {
        self.is_running() && !self.is_finished()
    }

    /// Next scheduled fire while active
    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        if self.is_active() {
            self.driver.next_fire()
        } else {
            None
        }
    }

    /// Arm the driver. A finished task starts over from a zero count.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.is_finished() {
            self.count = 0;
        }
        self.state = TaskState::Running;
        self.driver.arm(now);
        if self.driver.is_exhausted() {
            self.state = TaskState::Finished;
        }
    }

    /// Disarm the driver; `reset_counter` distinguishes stop from pause
    pub fn stop(&mut self, reset_counter: bool) {
        self.state = TaskState::Stopped;
        self.driver.disarm();
        if reset_counter {
            self.count = 0;
        }
    }

    pub fn pause(&mut self) {
        self.stop(false);
    }

    /// Deliver the due fire. Returns `None` when the task is no longer
    /// active, which drops fires that raced a stop.
    pub fn fire(&mut self, now: DateTime<Utc>) -> Option<FireOutcome> {
        if !self.is_active() {
            return None;
        }
        let scheduled = self.driver.next_fire()?;
        if scheduled > now {
            return None;
        }
        let solar_event = self.driver.solar_event_at(scheduled);

        self.count = self.count.saturating_add(1);
        self.driver.advance(now.max(scheduled));

        let limit_reached = self.limit > 0 && self.count >= self.limit;
        Some(FireOutcome {
            scheduled,
            count: self.count,
            solar_event,
            settle: limit_reached || self.driver.is_exhausted(),
            rearm: self.kind == ExpressionType::Solar && !limit_reached,
        })
    }

    /// Deferred half of a fire: stop a task whose limit was reached or whose
    /// dates ran out
    pub fn settle(&mut self) -> bool {
        if self.state != TaskState::Running {
            return false;
        }
        if self.is_finished() || self.driver.is_exhausted() {
            self.state = TaskState::Finished;
            self.driver.disarm();
            return true;
        }
        false
    }

    /// Recompute the next fire from `now` (solar re-resolve, clock jumps)
    pub fn rearm(&mut self, now: DateTime<Utc>) {
        if !self.is_active() {
            return;
        }
        self.driver.arm(now);
        if self.driver.is_exhausted() {
            self.state = TaskState::Finished;
        }
    }

    /// Config view; `include_flags` adds `isDynamic`/`modified`
    pub fn export(&self, include_flags: bool) -> TaskExport {
        let spec = &self.spec;
        let solar = self.kind == ExpressionType::Solar;
        TaskExport {
            topic: if spec.topic.is_empty() {
                spec.name.clone()
            } else {
                spec.topic.clone()
            },
            name: spec.name.clone(),
            payload_type: spec.payload_type.clone(),
            payload: spec.payload.clone(),
            limit: spec.limit.filter(|l| *l > 0),
            expression_type: self.kind.as_str().to_string(),
            expression: if solar { None } else { spec.expression.clone() },
            solar_type: solar.then(|| spec.solar_type.clone()),
            solar_events: if solar { spec.solar_events.clone() } else { None },
            location: solar.then(|| spec.location.clone()),
            offset: solar.then_some(spec.offset),
            is_dynamic: include_flags.then_some(self.dynamic),
            modified: include_flags.then_some(self.modified),
        }
    }

    /// Live status as of `now`
    pub fn status(&self, zone: &ScheduleTimeZone, now: DateTime<Utc>) -> TaskStatus {
        let description: Description = describe_expression(&self.spec, zone, now, true);
        let solar = self.kind == ExpressionType::Solar;
        let running = !self.is_finished();

        let next_date = if self.is_active() {
            self.driver.next_fire()
        } else if running {
            description.next_date
        } else {
            None
        };
        let next_description = next_date.filter(|_| running).map(|next| {
            let pretty = format!("in {}", pretty_duration((next - now).num_milliseconds()));
            match description.next_event.filter(|_| solar) {
                Some(event) => format!("{} {}", event, pretty),
                None => pretty,
            }
        });

        TaskStatus {
            origin: if self.dynamic { "dynamic" } else { "static" }.to_string(),
            modified: self.modified,
            is_running: running && self.is_running(),
            count: self.count,
            limit: self.limit,
            next_description,
            next_date,
            next_date_tz: next_date.map(|next| zone.format_short(next)),
            time_zone: zone.name(),
            server_time: now,
            server_time_zone: host_zone_name(),
            description: description.description,
            solar_state: if solar { description.solar_state } else { None },
            solar_state_offset: if solar { description.solar_state_offset } else { None },
            solar_times: solar.then(|| if running { description.event_times } else { None }),
            solar_event: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{apply_defaults, validate, ExpressionResolver};
    use chrono::Duration;
    use serde_json::json;

    fn task(value: Value, now: DateTime<Utc>) -> Task {
        let mut spec: ScheduleSpec = serde_json::from_value(value).unwrap();
        apply_defaults(&mut spec, 0);
        let kind = validate(&mut spec).unwrap();
        let resolver = ExpressionResolver::new(ScheduleTimeZone::parse(Some("UTC")).unwrap());
        let driver = resolver.resolve(&spec, kind, now).unwrap();
        Task::new(spec, kind, driver, 0, true)
    }

    fn fire_next(task: &mut Task) -> Option<FireOutcome> {
        let due = task.next_fire()?;
        let outcome = task.fire(due);
        if outcome.map(|o| o.settle).unwrap_or(false) {
            task.settle();
        }
        outcome
    }

    #[test]
    fn test_limit_stops_after_exact_fire_count() {
        let now = Utc::now();
        let mut t = task(json!({"name": "l", "expression": "* * * * * *", "limit": 3}), now);
        t.start(now);

        let mut fired = 0;
        while fire_next(&mut t).is_some() {
            fired += 1;
            assert!(fired <= 3);
        }
        assert_eq!(fired, 3);
        assert_eq!(t.count(), 3);
        assert!(!t.is_running());
        assert!(t.is_finished());
        assert_eq!(t.state(), TaskState::Finished);
    }

    #[test]
    fn test_stop_resets_and_pause_keeps_count() {
        let now = Utc::now();
        let mut t = task(json!({"name": "p", "expression": "* * * * * *"}), now);
        t.start(now);
        fire_next(&mut t);
        fire_next(&mut t);
        assert_eq!(t.count(), 2);

        t.pause();
        assert_eq!(t.count(), 2);
        assert!(t.next_fire().is_none());

        t.start(now);
        t.stop(true);
        assert_eq!(t.count(), 0);
        assert!(!t.is_running());
    }

    #[test]
    fn test_fire_after_stop_is_dropped() {
        let now = Utc::now();
        let mut t = task(json!({"name": "s", "expression": "* * * * * *"}), now);
        t.start(now);
        let due = t.next_fire().unwrap();
        t.stop(false);
        assert!(t.fire(due).is_none());
        assert_eq!(t.count(), 0);
    }

    #[test]
    fn test_start_resets_finished_task() {
        let now = Utc::now();
        let mut t = task(json!({"name": "r", "expression": "* * * * * *", "limit": 1}), now);
        t.start(now);
        fire_next(&mut t);
        assert!(t.is_finished());

        t.start(now);
        assert_eq!(t.count(), 0);
        assert!(t.is_active());
    }

    #[test]
    fn test_dates_task_finishes_when_exhausted() {
        let now = Utc::now();
        let at = (now + Duration::seconds(2)).timestamp_millis();
        let mut t = task(json!({"name": "d", "expression": [at]}), now);
        t.start(now);
        assert!(t.is_active());

        let outcome = fire_next(&mut t).unwrap();
        assert!(outcome.settle);
        assert_eq!(t.count(), 1);
        assert_eq!(t.state(), TaskState::Finished);
        assert!(t.next_fire().is_none());
    }

    #[test]
    fn test_export_shapes() {
        let now = Utc::now();
        let t = task(
            json!({"name": "x", "topic": "t", "expression": "0 0 * * * *", "payloadType": "str", "payload": "hi"}),
            now,
        );
        let exported = serde_json::to_value(t.export(false)).unwrap();
        assert_eq!(exported["expression"], json!("0 0 * * * *"));
        assert_eq!(exported["limit"], Value::Null);
        assert!(exported.get("location").is_none());
        assert!(exported.get("isDynamic").is_none());

        let flagged = serde_json::to_value(t.export(true)).unwrap();
        assert_eq!(flagged["isDynamic"], json!(true));
        assert_eq!(flagged["modified"], json!(false));
    }

    #[test]
    fn test_status_reports_next_fire() {
        let now = Utc::now();
        let mut t = task(json!({"name": "st", "expression": "0 * * * * *"}), now);
        t.start(now);
        let status = t.status(&ScheduleTimeZone::parse(Some("UTC")).unwrap(), now);

        assert_eq!(status.origin, "dynamic");
        assert!(status.is_running);
        assert_eq!(status.description, "Every minute");
        assert_eq!(status.next_date, t.next_fire());
        assert!(status.next_description.unwrap().starts_with("in "));
    }
}
