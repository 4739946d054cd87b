//! Scheduler core and its async service loop
//!
//! `Scheduler` is a synchronous state machine: every entry point takes the
//! current instant and returns the messages to emit. The service in
//! `service.rs` owns it on a single task and drives it from timers and
//! inbound requests, so the registry is never touched concurrently.
//!
//! # Turn model
//!
//! A fire never mutates its own driver beyond advancing it. Self-stop on
//! reaching the limit and solar re-resolution are queued as deferred work
//! and applied at the end of the same turn, after every due fire has been
//! delivered.

pub mod clock;
pub mod service;

pub use clock::ClockMonitor;
pub use service::{spawn, Request, SchedulerHandle};

use crate::command::{dispatch, CommandProcessor, Dispatch, InputMessage};
use crate::config::Config;
use crate::errors::{SchedulerError, SchedulerResult};
use crate::output::{MessageOrigin, OutputMessage, OutputRouter};
use crate::payload::{resolve_payload, set_property, PayloadEvaluator, PayloadSource};
use crate::persistence::PersistenceStore;
use crate::registry::TaskRegistry;
use crate::solar::SolarEvent;
use crate::task::{Task, TaskExport};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Registry mutation queued until the end of the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    Settle(Uuid),
    Rearm(Uuid),
}

/// One-line summary of what the scheduler will do next
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerStatus {
    NothingSet,
    Next { event: String, at: DateTime<Utc> },
    AllStopped,
    Failed(String),
}

impl fmt::Display for SchedulerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerStatus::NothingSet => write!(f, "Nothing set"),
            SchedulerStatus::Next { event, at } => write!(f, "{}: {}", event, at.to_rfc3339()),
            SchedulerStatus::AllStopped => write!(f, "All stopped"),
            SchedulerStatus::Failed(msg) => write!(f, "Error creating schedule: {}", msg),
        }
    }
}

pub struct Scheduler {
    registry: TaskRegistry,
    router: OutputRouter,
    evaluator: Arc<dyn PayloadEvaluator>,
    output_field: String,
    store: Option<PersistenceStore>,
    deferred: VecDeque<Deferred>,
    startup_error: Option<String>,
}

impl Scheduler {
    /// Build from configuration, creating the static tasks.
    ///
    /// If any static schedule is invalid no task is created and the status
    /// reports the failure; the scheduler still answers commands.
    pub fn new(
        config: &Config,
        evaluator: Arc<dyn PayloadEvaluator>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let zone = config.zone()?;
        let store = config
            .persist_dynamic
            .then(|| PersistenceStore::new(&config.persist_dir, &config.instance_id));

        let mut scheduler = Self {
            registry: TaskRegistry::new(zone),
            router: OutputRouter::new(config.command_response_msg_output, config.schedules.len()),
            evaluator,
            output_field: config.output_field.clone(),
            store,
            deferred: VecDeque::new(),
            startup_error: None,
        };

        for (index, spec) in config.schedules.iter().enumerate() {
            if let Err(e) = scheduler.registry.add(spec.clone(), index, true, now) {
                error!("✗ Failed to create static schedule {}: {}", index + 1, e);
                scheduler.registry = TaskRegistry::new(zone);
                scheduler.startup_error = Some(e.to_string());
                break;
            }
        }
        Ok(scheduler)
    }

    /// Scheduler using the configuration's flow/global context for payload lookups
    pub fn from_config(config: &Config, now: DateTime<Utc>) -> Result<Self> {
        Self::new(config, Arc::new(config.context.clone()), now)
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn router(&self) -> &OutputRouter {
        &self.router
    }

    /// Restore persisted dynamic tasks. Failures are logged; returns how many were restored.
    pub fn load_persisted(&mut self, now: DateTime<Utc>) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        let specs = match store.load() {
            Ok(Some(specs)) => specs,
            Ok(None) => return 0,
            Err(e) => {
                error!("✗ Error loading persistence data: {}", e);
                return 0;
            }
        };

        let mut restored = 0;
        for (index, mut spec) in specs.into_iter().enumerate() {
            if spec.name.is_empty() {
                spec.name = spec.topic.clone();
            }
            match self.registry.add(spec, index, false, now) {
                Ok(_) => restored += 1,
                Err(e) => warn!("✗ Skipped persisted schedule {}: {}", index + 1, e),
            }
        }
        info!("✓ Restored {} dynamic schedules", restored);
        restored
    }

    /// Handle one inbound message: a command, a batch of commands or an inject
    #[instrument(skip(self, input), fields(topic = input.topic.as_deref().unwrap_or("")))]
    pub fn handle_input(&mut self, input: &InputMessage, now: DateTime<Utc>) -> Vec<OutputMessage> {
        let mut out = Vec::new();
        let commands = match dispatch(input) {
            Ok(Dispatch::TriggerFirst) => {
                match self.registry.first().map(Task::id) {
                    Some(id) => out.extend(self.manual_trigger(id, now)),
                    None => debug!("Inject ignored, no schedules registered"),
                }
                return out;
            }
            Ok(Dispatch::Commands(commands)) => commands,
            Ok(Dispatch::Ignored) => {
                debug!("Ignored input without a command payload");
                return out;
            }
            Err(e) => {
                error!("✗ {}", e);
                let error = SchedulerError::from(e);
                let response = json!({ "command": input.topic, "error": error.to_string() });
                out.push(self.response_message(input, response, Some(&error)));
                return out;
            }
        };

        let mut persist = false;
        for command in &commands {
            let effect = CommandProcessor::new(&mut self.registry, now).execute(command);
            for id in &effect.manual_triggers {
                out.extend(self.manual_trigger(*id, now));
            }
            if let Some(e) = &effect.error {
                error!("✗ {}", e);
            }
            let response = match (effect.response, &effect.error) {
                (Some(response), _) => Some(response),
                (None, Some(e)) => Some(json!({ "command": command, "error": e.to_string() })),
                (None, None) => None,
            };
            if let Some(response) = response {
                out.push(self.response_message(input, response, effect.error.as_ref()));
            }
            persist |= effect.persist;
        }

        self.run_deferred(now);
        if persist {
            self.persist();
        }
        out
    }

    /// Deliver every fire due at `now`, then apply deferred work
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<OutputMessage> {
        let due: Vec<Uuid> = self
            .registry
            .tasks()
            .iter()
            .filter(|task| task.next_fire().is_some_and(|at| at <= now))
            .map(Task::id)
            .collect();

        let mut out = Vec::new();
        for id in due {
            let Some(task) = self.registry.get_by_id_mut(id) else {
                continue;
            };
            let Some(outcome) = task.fire(now) else {
                continue;
            };
            if outcome.settle {
                self.deferred.push_back(Deferred::Settle(id));
            }
            if outcome.rearm {
                self.deferred.push_back(Deferred::Rearm(id));
            }

            let Some(task) = self.registry.get_by_id(id) else {
                continue;
            };
            info!(
                "Fired '{}' (scheduled {}, count {})",
                task.name(),
                outcome.scheduled.to_rfc3339(),
                outcome.count
            );
            match self.fire_message(task, outcome.scheduled, outcome.solar_event, false, now) {
                Ok(message) => out.push(message),
                Err(e) => error!("✗ Failed to build message for '{}': {}", task.name(), e),
            }
        }

        self.run_deferred(now);
        out
    }

    fn run_deferred(&mut self, now: DateTime<Utc>) {
        while let Some(item) = self.deferred.pop_front() {
            match item {
                Deferred::Settle(id) => {
                    if let Some(task) = self.registry.get_by_id_mut(id) {
                        if task.settle() {
                            info!("Schedule '{}' finished (count {})", task.name(), task.count());
                        }
                    }
                }
                Deferred::Rearm(id) => {
                    if let Some(task) = self.registry.get_by_id_mut(id) {
                        task.rearm(now);
                    }
                }
            }
        }
    }

    /// Recompute every active driver after the wall clock moved
    pub fn on_clock_jump(&mut self, now: DateTime<Utc>) {
        info!("System time change detected, rearming schedules");
        for task in self.registry.iter_mut() {
            task.rearm(now);
        }
    }

    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.registry.next_overall_fire().map(|(_, at)| at)
    }

    pub fn status(&self) -> SchedulerStatus {
        if let Some(msg) = &self.startup_error {
            return SchedulerStatus::Failed(msg.clone());
        }
        match self.registry.next_overall_fire() {
            Some((task, at)) => SchedulerStatus::Next {
                event: task
                    .driver()
                    .solar_event_at(at)
                    .map(|event| event.as_str().to_string())
                    .unwrap_or_else(|| task.name().to_string()),
                at,
            },
            None if self.registry.is_empty() => SchedulerStatus::NothingSet,
            None => SchedulerStatus::AllStopped,
        }
    }

    /// Write the dynamic tasks snapshot, if persistence is enabled
    pub fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let schedules: Vec<TaskExport> = self
            .registry
            .dynamic_tasks()
            .map(|task| task.export(false))
            .collect();
        if let Err(e) = store.save(&schedules) {
            error!("✗ Error saving persistence data: {}", e);
        }
    }

    pub fn shutdown(&mut self) {
        self.persist();
        for task in self.registry.iter_mut() {
            task.stop(false);
        }
        info!("Scheduler stopped");
    }

    /// Fire a task now without touching its count, driver or state
    fn manual_trigger(&self, id: Uuid, now: DateTime<Utc>) -> Option<OutputMessage> {
        let task = self.registry.get_by_id(id)?;
        debug!("Manual trigger of '{}'", task.name());
        match self.fire_message(task, now, None, true, now) {
            Ok(message) => Some(message),
            Err(e) => {
                error!("✗ Failed to build message for '{}': {}", task.name(), e);
                None
            }
        }
    }

    fn origin_of(task: &Task) -> MessageOrigin {
        if task.is_static() {
            MessageOrigin::Static {
                index: task.index(),
            }
        } else {
            MessageOrigin::Dynamic
        }
    }

    fn fire_message(
        &self,
        task: &Task,
        triggered: DateTime<Utc>,
        solar_event: Option<SolarEvent>,
        manual: bool,
        now: DateTime<Utc>,
    ) -> SchedulerResult<OutputMessage> {
        let mut status = task.status(self.registry.zone(), now);
        status.solar_event = solar_event;

        let info = json!({
            "triggerTimestamp": triggered.timestamp_millis(),
            "status": serde_json::to_value(&status).map_err(|e| SchedulerError::Payload(e.to_string()))?,
            "config": serde_json::to_value(task.export(false)).map_err(|e| SchedulerError::Payload(e.to_string()))?,
        });

        let mut message = Map::new();
        message.insert("topic".into(), Value::from(task.topic()));
        if manual {
            message.insert("manualTrigger".into(), Value::Bool(true));
        }
        message.insert("scheduledEvent".into(), Value::Bool(!manual));

        let spec = task.spec();
        let payload = match PayloadSource::from_parts(&spec.payload_type, &spec.payload)? {
            PayloadSource::FireInfo => info,
            source => {
                let payload = resolve_payload(&source, &info, now, self.evaluator.as_ref())?;
                message.insert("schedule".into(), info);
                payload
            }
        };
        set_property(&mut message, &self.output_field, payload);

        Ok(self.router.route(Self::origin_of(task), Value::Object(message)))
    }

    /// Command response: the inbound message with its payload replaced
    fn response_message(
        &self,
        input: &InputMessage,
        response: Value,
        error: Option<&SchedulerError>,
    ) -> OutputMessage {
        let mut message = Map::new();
        if let Some(topic) = &input.topic {
            message.insert("topic".into(), Value::from(topic.as_str()));
        }
        message.insert("payload".into(), response);
        if let Some(e) = error {
            message.insert("error".into(), json!({ "message": e.to_string() }));
        }
        self.router
            .route(MessageOrigin::CommandResponse, Value::Object(message))
    }
}
