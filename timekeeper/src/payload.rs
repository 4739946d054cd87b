//! Payload resolution for outgoing fire messages
//!
//! A schedule's `payloadType`/`payload` pair becomes a [`PayloadSource`]:
//! either a literal value of a given kind or a context lookup. Context
//! lookups go through a [`PayloadEvaluator`], so hosts can plug in their own
//! flow/global stores.

use crate::errors::{SchedulerError, SchedulerResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// The fire info object itself
    Default,
    /// Epoch milliseconds at fire time
    Date,
    None,
    Str,
    Num,
    Bool,
    Json,
    Bin,
    Flow,
    Global,
    Env,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Default => "default",
            PayloadKind::Date => "date",
            PayloadKind::None => "none",
            PayloadKind::Str => "str",
            PayloadKind::Num => "num",
            PayloadKind::Bool => "bool",
            PayloadKind::Json => "json",
            PayloadKind::Bin => "bin",
            PayloadKind::Flow => "flow",
            PayloadKind::Global => "global",
            PayloadKind::Env => "env",
        }
    }
}

impl FromStr for PayloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "default" => Ok(PayloadKind::Default),
            "date" => Ok(PayloadKind::Date),
            "none" => Ok(PayloadKind::None),
            "str" => Ok(PayloadKind::Str),
            "num" => Ok(PayloadKind::Num),
            "bool" => Ok(PayloadKind::Bool),
            "json" => Ok(PayloadKind::Json),
            "bin" => Ok(PayloadKind::Bin),
            "flow" => Ok(PayloadKind::Flow),
            "global" => Ok(PayloadKind::Global),
            "env" => Ok(PayloadKind::Env),
            other => Err(format!("unknown payload type '{}'", other)),
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextScope {
    Flow,
    Global,
    Env,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayloadSource {
    FireInfo,
    Timestamp,
    Empty,
    Literal { kind: PayloadKind, value: Value },
    Lookup { scope: ContextScope, path: String },
}

impl PayloadSource {
    pub fn from_parts(payload_type: &str, payload: &Value) -> SchedulerResult<Self> {
        let kind: PayloadKind = payload_type.parse().map_err(SchedulerError::Payload)?;
        let path = || match payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(match kind {
            PayloadKind::Default => PayloadSource::FireInfo,
            PayloadKind::Date => PayloadSource::Timestamp,
            PayloadKind::None => PayloadSource::Empty,
            PayloadKind::Flow => PayloadSource::Lookup {
                scope: ContextScope::Flow,
                path: path(),
            },
            PayloadKind::Global => PayloadSource::Lookup {
                scope: ContextScope::Global,
                path: path(),
            },
            PayloadKind::Env => PayloadSource::Lookup {
                scope: ContextScope::Env,
                path: path(),
            },
            kind => PayloadSource::Literal {
                kind,
                value: payload.clone(),
            },
        })
    }
}

/// Resolves context lookups for `flow`, `global` and `env` payloads
pub trait PayloadEvaluator: Send + Sync {
    fn lookup(&self, scope: ContextScope, path: &str) -> Option<Value>;
}

/// Flow/global values from configuration, env from the process environment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextEvaluator {
    #[serde(default)]
    pub flow: HashMap<String, Value>,
    #[serde(default)]
    pub global: HashMap<String, Value>,
}

impl ContextEvaluator {
    fn walk(root: &HashMap<String, Value>, path: &str) -> Option<Value> {
        let mut keys = path.split('.');
        let mut current = root.get(keys.next()?)?;
        for key in keys {
            current = match current {
                Value::Object(map) => map.get(key)?,
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }
}

impl PayloadEvaluator for ContextEvaluator {
    fn lookup(&self, scope: ContextScope, path: &str) -> Option<Value> {
        match scope {
            ContextScope::Flow => Self::walk(&self.flow, path),
            ContextScope::Global => Self::walk(&self.global, path),
            ContextScope::Env => std::env::var(path).ok().map(Value::String),
        }
    }
}

/// Produce the value placed in the output field of a fire message
pub fn resolve_payload(
    source: &PayloadSource,
    fire_info: &Value,
    now: DateTime<Utc>,
    evaluator: &dyn PayloadEvaluator,
) -> SchedulerResult<Value> {
    match source {
        PayloadSource::FireInfo => Ok(fire_info.clone()),
        PayloadSource::Timestamp => Ok(Value::from(now.timestamp_millis())),
        PayloadSource::Empty => Ok(Value::from("")),
        PayloadSource::Lookup { scope, path } => Ok(match evaluator.lookup(*scope, path) {
            Some(value) => value,
            None if *scope == ContextScope::Env => Value::from(""),
            None => Value::Null,
        }),
        PayloadSource::Literal { kind, value } => coerce(*kind, value),
    }
}

fn coerce(kind: PayloadKind, value: &Value) -> SchedulerResult<Value> {
    let fail = |expected: &str| {
        SchedulerError::Payload(format!("cannot convert {} to {}", value, expected))
    };
    match kind {
        PayloadKind::Str => Ok(match value {
            Value::String(_) => value.clone(),
            Value::Null => Value::from(""),
            other => Value::from(other.to_string()),
        }),
        PayloadKind::Num => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    Ok(Value::from(i))
                } else {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
                        .ok_or_else(|| fail("num"))
                }
            }
            _ => Err(fail("num")),
        },
        PayloadKind::Bool => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) if s == "true" => Ok(Value::Bool(true)),
            Value::String(s) if s == "false" => Ok(Value::Bool(false)),
            _ => Err(fail("bool")),
        },
        PayloadKind::Json => match value {
            Value::String(s) => serde_json::from_str(s).map_err(|_| fail("json")),
            other => Ok(other.clone()),
        },
        PayloadKind::Bin => match value {
            Value::Array(items) if items.iter().all(|v| v.as_u64().map(|n| n <= 255).unwrap_or(false)) => {
                Ok(value.clone())
            }
            Value::String(s) => {
                if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(s) {
                    return coerce(PayloadKind::Bin, &Value::Array(items));
                }
                Ok(Value::Array(s.bytes().map(Value::from).collect()))
            }
            _ => Err(fail("bin")),
        },
        other => Err(SchedulerError::Payload(format!(
            "payload type '{}' is not a literal",
            other
        ))),
    }
}

/// Set `value` at a dotted `path` in `msg`, creating intermediate objects
pub fn set_property(msg: &mut Map<String, Value>, path: &str, value: Value) {
    let mut keys: Vec<&str> = path.split('.').filter(|k| !k.is_empty()).collect();
    let Some(last) = keys.pop() else {
        return;
    };
    let mut current = msg;
    for key in keys {
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}
