//! Command vocabulary and input dispatch
//!
//! A command name is an action optionally followed by a bulk suffix:
//! `status`, `status-all`, `stop-all-dynamic`, `trigger-inactive-static`, ...
//! Commands arrive either as a control topic (topic = command, payload =
//! schedule name where one is needed) or as one command object / an array of
//! command objects in the payload.

pub mod processor;

pub use processor::{CommandEffect, CommandProcessor};

use crate::errors::LookupError;
use crate::registry::TaskFilter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Trigger,
    Status,
    List,
    Export,
    Debug,
    Add,
    Update,
    Remove,
    Delete,
    Clear,
    Start,
    Stop,
    Pause,
    Describe,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Trigger => "trigger",
            Action::Status => "status",
            Action::List => "list",
            Action::Export => "export",
            Action::Debug => "debug",
            Action::Add => "add",
            Action::Update => "update",
            Action::Remove => "remove",
            Action::Delete => "delete",
            Action::Clear => "clear",
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Pause => "pause",
            Action::Describe => "describe",
        }
    }

    /// Actions that accept a bulk suffix
    pub fn supports_bulk(&self) -> bool {
        matches!(
            self,
            Action::Trigger
                | Action::Status
                | Action::List
                | Action::Export
                | Action::Debug
                | Action::Remove
                | Action::Delete
                | Action::Start
                | Action::Stop
                | Action::Pause
        )
    }

    /// Mutations that change what a snapshot would contain
    pub fn persists(&self) -> bool {
        matches!(
            self,
            Action::Add | Action::Update | Action::Remove | Action::Delete | Action::Clear
        )
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "trigger" => Action::Trigger,
            "status" => Action::Status,
            "list" => Action::List,
            "export" => Action::Export,
            "debug" => Action::Debug,
            "add" => Action::Add,
            "update" => Action::Update,
            "remove" => Action::Remove,
            "delete" => Action::Delete,
            "clear" => Action::Clear,
            "start" => Action::Start,
            "stop" => Action::Stop,
            "pause" => Action::Pause,
            "describe" => Action::Describe,
            other => return Err(other.to_string()),
        })
    }
}

/// What a command applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// One schedule, named in the command
    Named,
    /// Every schedule matching the filter
    Bulk(TaskFilter),
    /// Neither (add/update/describe)
    Spec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandName {
    pub action: Action,
    pub target: Target,
}

impl CommandName {
    /// Whether a control topic for this command expects the schedule name as payload
    pub fn payload_is_name(&self) -> bool {
        self.target == Target::Named
    }
}

impl FromStr for CommandName {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || LookupError::UnknownCommand {
            command: s.to_string(),
        };
        let (head, suffix) = match s.split_once('-') {
            Some((head, suffix)) => (head, Some(suffix)),
            None => (s, None),
        };
        let action: Action = head.parse().map_err(|_| unknown())?;

        let target = match (action, suffix) {
            (Action::Add | Action::Update | Action::Describe, None) => Target::Spec,
            (Action::Clear, None) | (Action::List, None) => Target::Bulk(TaskFilter::All),
            (_, None) => Target::Named,
            (action, Some(suffix)) if action.supports_bulk() => {
                Target::Bulk(suffix.parse().map_err(|_| unknown())?)
            }
            _ => return Err(unknown()),
        };
        Ok(CommandName { action, target })
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Target::Bulk(TaskFilter::All) if self.action == Action::Clear => write!(f, "clear"),
            Target::Bulk(filter) => write!(f, "{}-{}", self.action.as_str(), filter_suffix(filter)),
            _ => write!(f, "{}", self.action.as_str()),
        }
    }
}

fn filter_suffix(filter: TaskFilter) -> &'static str {
    match filter {
        TaskFilter::Static => "all-static",
        TaskFilter::Dynamic => "all-dynamic",
        other => other.as_str(),
    }
}

/// One inbound message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

/// How an inbound message is to be handled
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Inject with no topic and no payload: fire the first schedule
    TriggerFirst,
    /// Command objects to run in order
    Commands(Vec<Value>),
    /// Payload was neither a command object nor a list of them
    Ignored,
}

fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Turn an input message into command objects
pub fn dispatch(input: &InputMessage) -> Result<Dispatch, LookupError> {
    let topic = input.topic.as_deref().unwrap_or("");
    if topic.is_empty() && is_empty_payload(&input.payload) {
        return Ok(Dispatch::TriggerFirst);
    }

    if let Ok(name) = topic.parse::<CommandName>() {
        if name.target != Target::Spec {
            if name.payload_is_name() {
                return match &input.payload {
                    Value::String(schedule) if !schedule.is_empty() => {
                        Ok(Dispatch::Commands(vec![json!({"command": topic, "name": schedule})]))
                    }
                    _ => Err(LookupError::MissingName {
                        command: topic.to_string(),
                    }),
                };
            }
            return Ok(Dispatch::Commands(vec![json!({"command": topic})]));
        }
    }

    Ok(match &input.payload {
        Value::Array(items) => Dispatch::Commands(items.clone()),
        Value::Object(_) => Dispatch::Commands(vec![input.payload.clone()]),
        _ => Dispatch::Ignored,
    })
}
