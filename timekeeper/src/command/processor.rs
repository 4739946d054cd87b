use super::{Action, CommandName, Target};
use crate::describe::describe_expression;
use crate::errors::{LookupError, SchedulerError, SchedulerResult, ValidationError};
use crate::registry::{TaskFilter, TaskRegistry};
use crate::schedule::{apply_defaults, ScheduleSpec, ScheduleTimeZone};
use crate::task::Task;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Result of one command against the registry
#[derive(Debug, Default)]
pub struct CommandEffect {
    /// Payload of the command-response message, if the command answers
    pub response: Option<Value>,
    pub error: Option<SchedulerError>,
    /// Tasks to fire immediately as manual triggers
    pub manual_triggers: Vec<Uuid>,
    /// Registry contents changed in a way a snapshot would record
    pub persist: bool,
}

impl CommandEffect {
    fn reply(command: &Value, result: Value) -> Self {
        Self {
            response: Some(json!({ "command": command, "result": result })),
            ..Default::default()
        }
    }

    fn failed(error: impl Into<SchedulerError>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Runs commands against a registry at a fixed instant
pub struct CommandProcessor<'a> {
    registry: &'a mut TaskRegistry,
    now: DateTime<Utc>,
}

impl<'a> CommandProcessor<'a> {
    pub fn new(registry: &'a mut TaskRegistry, now: DateTime<Utc>) -> Self {
        Self { registry, now }
    }

    /// Execute one command object. Errors are reported in the effect so a
    /// batch can carry on with the next command.
    #[instrument(skip(self, command), fields(command = %command.get("command").and_then(serde_json::Value::as_str).unwrap_or("")))]
    pub fn execute(&mut self, command: &Value) -> CommandEffect {
        let raw = command.get("command").and_then(Value::as_str).unwrap_or("");
        let name: CommandName = match raw.parse() {
            Ok(name) => name,
            Err(e) => {
                warn!("✗ {}", e);
                return CommandEffect::failed(e);
            }
        };
        debug!("Executing '{}'", name);

        match name.target {
            Target::Spec => self.execute_spec(name.action, command),
            Target::Named => match schedule_name(command) {
                Some(schedule) => self.execute_named(name.action, command, &schedule),
                None => CommandEffect::failed(LookupError::MissingName {
                    command: raw.to_string(),
                }),
            },
            Target::Bulk(filter) => self.execute_bulk(name.action, command, filter),
        }
    }

    fn execute_spec(&mut self, action: Action, command: &Value) -> CommandEffect {
        match action {
            Action::Describe => match self.describe(command) {
                Ok(result) => CommandEffect::reply(command, result),
                Err(e) => CommandEffect::failed(e),
            },
            _ => match self.upsert(command) {
                Ok(()) => CommandEffect {
                    persist: true,
                    ..Default::default()
                },
                Err(e) => {
                    warn!("✗ Schedule not applied: {}", e);
                    CommandEffect::failed(e)
                }
            },
        }
    }

    fn upsert(&mut self, command: &Value) -> SchedulerResult<()> {
        if !command.is_object() {
            return Err(ValidationError::MissingSpec.into());
        }
        let spec: ScheduleSpec = serde_json::from_value(command.clone())
            .map_err(|_| SchedulerError::from(ValidationError::MissingSpec))?;
        self.registry.upsert_all(vec![spec], self.now)?;
        Ok(())
    }

    fn describe(&self, command: &Value) -> SchedulerResult<Value> {
        let mut spec: ScheduleSpec = serde_json::from_value(command.clone())
            .map_err(|_| SchedulerError::from(ValidationError::MissingSpec))?;
        apply_defaults(&mut spec, 0);

        let zone = match command.get("timeZone").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => ScheduleTimeZone::parse(Some(name))?,
            _ => *self.registry.zone(),
        };
        let now = command
            .get("time")
            .and_then(parse_instant)
            .unwrap_or(self.now);

        let description = describe_expression(&spec, &zone, now, true);
        serde_json::to_value(description).map_err(|e| SchedulerError::Payload(e.to_string()))
    }

    fn execute_named(&mut self, action: Action, command: &Value, schedule: &str) -> CommandEffect {
        let zone = *self.registry.zone();
        let now = self.now;

        match action {
            Action::Trigger => match self.registry.get(schedule) {
                Some(task) => CommandEffect {
                    manual_triggers: vec![task.id()],
                    ..Default::default()
                },
                None => CommandEffect::failed(LookupError::ScheduleNotFound {
                    name: schedule.to_string(),
                    action: "Manual Trigger".to_string(),
                }),
            },
            Action::Status | Action::Export | Action::Debug => {
                let Some(task) = self.registry.get(schedule) else {
                    let mut effect = if action == Action::Debug {
                        CommandEffect::default()
                    } else {
                        CommandEffect::reply(command, json!({}))
                    };
                    effect.error = Some(
                        LookupError::NotFound {
                            name: schedule.to_string(),
                        }
                        .into(),
                    );
                    return effect;
                };
                match action {
                    Action::Status => CommandEffect::reply(command, status_entry(task, &zone, now)),
                    Action::Export => CommandEffect::reply(command, to_value(&task.export(false))),
                    _ => CommandEffect {
                        response: Some(debug_entry(task, &zone, now)),
                        ..Default::default()
                    },
                }
            }
            Action::Remove | Action::Delete => {
                self.registry.remove(schedule);
                CommandEffect {
                    persist: true,
                    ..Default::default()
                }
            }
            Action::Start => {
                if let Some(task) = self.registry.get_mut(schedule) {
                    task.start(now);
                    info!("Started schedule '{}'", schedule);
                }
                CommandEffect::default()
            }
            Action::Stop | Action::Pause => {
                if let Some(task) = self.registry.get_mut(schedule) {
                    task.stop(action == Action::Stop);
                    info!("{} schedule '{}'", if action == Action::Stop { "Stopped" } else { "Paused" }, schedule);
                }
                CommandEffect::default()
            }
            _ => CommandEffect::failed(LookupError::UnknownCommand {
                command: action.as_str().to_string(),
            }),
        }
    }

    fn execute_bulk(&mut self, action: Action, command: &Value, filter: TaskFilter) -> CommandEffect {
        let zone = *self.registry.zone();
        let now = self.now;

        match action {
            Action::Trigger => CommandEffect {
                manual_triggers: self.registry.matching_ids(filter),
                ..Default::default()
            },
            Action::Status | Action::List => {
                let results: Vec<Value> = self
                    .registry
                    .filter(filter)
                    .map(|task| status_entry(task, &zone, now))
                    .collect();
                CommandEffect::reply(command, Value::Array(results))
            }
            Action::Export => {
                let results: Vec<Value> = self
                    .registry
                    .filter(filter)
                    .map(|task| to_value(&task.export(false)))
                    .collect();
                CommandEffect::reply(command, Value::Array(results))
            }
            Action::Debug => {
                let results: Vec<Value> = self
                    .registry
                    .filter(filter)
                    .map(|task| debug_entry(task, &zone, now))
                    .collect();
                CommandEffect {
                    response: Some(Value::Array(results)),
                    ..Default::default()
                }
            }
            Action::Remove | Action::Delete | Action::Clear => {
                self.registry.remove_matching(filter);
                CommandEffect {
                    persist: true,
                    ..Default::default()
                }
            }
            Action::Start => {
                for id in self.registry.matching_ids(filter) {
                    if let Some(task) = self.registry.get_by_id_mut(id) {
                        task.start(now);
                    }
                }
                info!("Started schedules matching '{}'", filter);
                CommandEffect::default()
            }
            Action::Stop | Action::Pause => {
                let reset = action == Action::Stop;
                for id in self.registry.matching_ids(filter) {
                    if let Some(task) = self.registry.get_by_id_mut(id) {
                        task.stop(reset);
                    }
                }
                info!(
                    "{} schedules matching '{}'",
                    if reset { "Stopped" } else { "Paused" },
                    filter
                );
                CommandEffect::default()
            }
            _ => CommandEffect::failed(LookupError::UnknownCommand {
                command: action.as_str().to_string(),
            }),
        }
    }
}

fn schedule_name(command: &Value) -> Option<String> {
    match command.get("name")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

fn to_value<T: serde::Serialize>(item: &T) -> Value {
    serde_json::to_value(item).unwrap_or(Value::Null)
}

fn status_entry(task: &Task, zone: &ScheduleTimeZone, now: DateTime<Utc>) -> Value {
    json!({
        "config": to_value(&task.export(true)),
        "status": to_value(&task.status(zone, now)),
    })
}

fn debug_entry(task: &Task, zone: &ScheduleTimeZone, now: DateTime<Utc>) -> Value {
    let mut entry = match to_value(&task.status(zone, now)) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let spec = task.spec();
    entry.insert("name".into(), json!(spec.name));
    entry.insert("topic".into(), json!(spec.topic));
    entry.insert("expressionType".into(), json!(task.kind().as_str()));
    entry.insert("expression".into(), to_value(&spec.expression));
    entry.insert("location".into(), json!(spec.location));
    entry.insert("offset".into(), json!(spec.offset));
    entry.insert("solarType".into(), json!(spec.solar_type));
    entry.insert("solarEvents".into(), to_value(&spec.solar_events));
    Value::Object(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry_with(specs: Vec<Value>) -> TaskRegistry {
        let mut registry = TaskRegistry::new(ScheduleTimeZone::parse(Some("UTC")).unwrap());
        let now = Utc::now();
        for (i, spec) in specs.into_iter().enumerate() {
            registry
                .add(serde_json::from_value(spec).unwrap(), i, true, now)
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_trigger_unknown_name_is_lookup_error() {
        let mut registry = registry_with(vec![]);
        let effect = CommandProcessor::new(&mut registry, Utc::now())
            .execute(&json!({"command": "trigger", "name": "ghost"}));
        assert_eq!(
            effect.error.unwrap().to_string(),
            "Manual Trigger failed. Cannot find schedule named 'ghost'"
        );
    }

    #[test]
    fn test_status_unknown_name_answers_with_error() {
        let mut registry = registry_with(vec![]);
        let effect = CommandProcessor::new(&mut registry, Utc::now())
            .execute(&json!({"command": "status", "name": "ghost"}));
        assert!(effect.response.is_some());
        assert_eq!(effect.error.unwrap().to_string(), "ghost not found");
    }

    #[test]
    fn test_describe_does_not_register() {
        let mut registry = registry_with(vec![]);
        let effect = CommandProcessor::new(&mut registry, Utc::now()).execute(&json!({
            "command": "describe",
            "expressionType": "cron",
            "expression": "0 * * * * * *"
        }));
        let response = effect.response.unwrap();
        assert_eq!(response["result"]["description"], json!("Every minute"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_add_then_stop_all_dynamic() {
        let mut registry = registry_with(vec![json!({"name": "fixed", "expression": "* * * * *"})]);
        let now = Utc::now();

        let effect = CommandProcessor::new(&mut registry, now).execute(&json!({
            "command": "add", "name": "extra", "expression": "*/5 * * * * *"
        }));
        assert!(effect.persist);
        assert!(registry.get("extra").unwrap().is_dynamic());

        CommandProcessor::new(&mut registry, now).execute(&json!({"command": "stop-all-dynamic"}));
        assert!(!registry.get("extra").unwrap().is_running());
        assert!(registry.get("fixed").unwrap().is_running());
    }

    #[test]
    fn test_invalid_add_reports_validation_error() {
        let mut registry = registry_with(vec![]);
        let effect = CommandProcessor::new(&mut registry, Utc::now())
            .execute(&json!({"command": "add", "name": "x", "expression": "sometime"}));
        assert!(matches!(effect.error, Some(SchedulerError::Validation(_))));
        assert!(!effect.persist);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_debug_includes_spec_fields() {
        let mut registry = registry_with(vec![json!({"name": "dbg", "expression": "0 0 * * * *"})]);
        let effect = CommandProcessor::new(&mut registry, Utc::now())
            .execute(&json!({"command": "debug", "name": "dbg"}));
        let payload = effect.response.unwrap();
        assert_eq!(payload["name"], json!("dbg"));
        assert_eq!(payload["expressionType"], json!("cron"));
        assert_eq!(payload["type"], json!("static"));
    }
}
