pub mod manager;

pub use manager::ConfigManager;

use crate::constants::defaults::{OUTPUT_FIELD, PERSIST_DIR};
use crate::output::OutputMode;
use crate::payload::ContextEvaluator;
use crate::schedule::{ScheduleSpec, ScheduleTimeZone};
use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Scheduler instance configuration, read from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_name")]
    pub name: String,
    /// Stem of the persistence file
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
    /// IANA zone name; empty selects the host zone
    #[serde(default)]
    pub time_zone: String,
    /// Dotted message path receiving the resolved payload
    #[serde(default = "default_output_field")]
    pub output_field: String,
    #[serde(default)]
    pub persist_dynamic: bool,
    #[serde(default = "default_persist_dir")]
    pub persist_dir: String,
    #[serde(default)]
    pub command_response_msg_output: OutputMode,
    /// Static schedules, created at startup in this order
    #[serde(default)]
    pub schedules: Vec<ScheduleSpec>,
    #[serde(default)]
    pub context: ContextEvaluator,
}

fn default_name() -> String {
    "timekeeper".to_string()
}

fn default_instance_id() -> String {
    "timekeeper".to_string()
}

fn default_output_field() -> String {
    OUTPUT_FIELD.to_string()
}

fn default_persist_dir() -> String {
    PERSIST_DIR.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            instance_id: default_instance_id(),
            time_zone: String::new(),
            output_field: default_output_field(),
            persist_dynamic: false,
            persist_dir: default_persist_dir(),
            command_response_msg_output: OutputMode::default(),
            schedules: Vec::new(),
            context: ContextEvaluator::default(),
        }
    }
}

impl Config {
    pub fn zone(&self) -> Result<ScheduleTimeZone> {
        ScheduleTimeZone::parse(Some(&self.time_zone)).map_err(|e| anyhow!("Invalid timeZone: {}", e))
    }

    /// Checks that do not depend on individual schedules. Invalid schedules
    /// are reported through the scheduler status instead.
    pub fn validate(&self) -> Result<()> {
        self.zone()?;
        if self.output_field.split('.').all(str::is_empty) {
            return Err(anyhow!("outputField must name a message property"));
        }
        if self.persist_dynamic && self.instance_id.trim().is_empty() {
            return Err(anyhow!("instanceId is required when persistDynamic is enabled"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            name = "lights"
            instanceId = "node-7"
            timeZone = "Europe/London"
            outputField = "data.value"
            persistDynamic = true
            commandResponseMsgOutput = "fanOut"

            [[schedules]]
            name = "morning"
            expression = "0 30 7 * * 1-5"
            payloadType = "str"
            payload = "wake"

            [[schedules]]
            name = "dusk"
            expressionType = "solar"
            location = "51.47,-0.0"
            solarType = "selected"
            solarEvents = "sunset"

            [context.flow]
            mode = "eco"
            "#,
        )
        .unwrap();

        assert_eq!(config.instance_id, "node-7");
        assert_eq!(config.command_response_msg_output, OutputMode::FanOut);
        assert_eq!(config.schedules.len(), 2);
        assert_eq!(config.schedules[1].location, "51.47,-0.0");
        assert_eq!(config.persist_dir, PERSIST_DIR);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_and_bad_zone() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.output_field, "payload");
        assert!(config.schedules.is_empty());
        assert!(config.validate().is_ok());

        let bad = Config {
            time_zone: "Mars/Olympus".to_string(),
            ..Config::default()
        };
        assert!(bad.validate().is_err());
    }
}
