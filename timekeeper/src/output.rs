//! Output channel routing
//!
//! - `output1`: everything on channel 0
//! - `output2`: fires on channel 0, command responses on channel 1
//! - `fanOut`: one channel per static schedule, then a shared dynamic
//!   channel, then the command-response channel

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputMode {
    #[default]
    #[serde(rename = "output1")]
    Single,
    #[serde(rename = "output2")]
    SplitResponses,
    #[serde(rename = "fanOut")]
    FanOut,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "output1" => Ok(OutputMode::Single),
            "output2" => Ok(OutputMode::SplitResponses),
            "fanOut" => Ok(OutputMode::FanOut),
            other => Err(format!("unknown output mode '{}'", other)),
        }
    }
}

/// What produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    Static { index: usize },
    Dynamic,
    CommandResponse,
}

/// A message bound for one output channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputMessage {
    pub channel: usize,
    pub message: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRouter {
    mode: OutputMode,
    static_count: usize,
}

impl OutputRouter {
    pub fn new(mode: OutputMode, static_count: usize) -> Self {
        Self { mode, static_count }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn channel_count(&self) -> usize {
        match self.mode {
            OutputMode::Single => 1,
            OutputMode::SplitResponses => 2,
            OutputMode::FanOut => self.static_count + 2,
        }
    }

    pub fn channel_for(&self, origin: MessageOrigin) -> usize {
        match (self.mode, origin) {
            (OutputMode::Single, _) => 0,
            (OutputMode::SplitResponses, MessageOrigin::CommandResponse) => 1,
            (OutputMode::SplitResponses, _) => 0,
            (OutputMode::FanOut, MessageOrigin::Static { index }) => index,
            (OutputMode::FanOut, MessageOrigin::Dynamic) => self.static_count,
            (OutputMode::FanOut, MessageOrigin::CommandResponse) => self.static_count + 1,
        }
    }

    pub fn route(&self, origin: MessageOrigin, message: Value) -> OutputMessage {
        OutputMessage {
            channel: self.channel_for(origin),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OutputMode::Single, MessageOrigin::Static { index: 2 }, 0)]
    #[case(OutputMode::Single, MessageOrigin::CommandResponse, 0)]
    #[case(OutputMode::SplitResponses, MessageOrigin::Dynamic, 0)]
    #[case(OutputMode::SplitResponses, MessageOrigin::CommandResponse, 1)]
    #[case(OutputMode::FanOut, MessageOrigin::Static { index: 2 }, 2)]
    #[case(OutputMode::FanOut, MessageOrigin::Dynamic, 3)]
    #[case(OutputMode::FanOut, MessageOrigin::CommandResponse, 4)]
    fn test_channel_selection(
        #[case] mode: OutputMode,
        #[case] origin: MessageOrigin,
        #[case] expected: usize,
    ) {
        let router = OutputRouter::new(mode, 3);
        assert_eq!(router.channel_for(origin), expected);
        assert!(expected < router.channel_count());
    }

    #[test]
    fn test_mode_names() {
        assert_eq!("fanOut".parse::<OutputMode>(), Ok(OutputMode::FanOut));
        assert_eq!(serde_json::to_value(OutputMode::SplitResponses).unwrap(), "output2");
        assert!("output3".parse::<OutputMode>().is_err());
    }
}
