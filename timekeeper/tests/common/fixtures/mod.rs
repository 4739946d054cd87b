//! Reusable test utilities:
//! - Schedule spec builders and common names
//! - Config builder writing TOML into a temp directory

// Allow unused code in test fixtures - not every test binary uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod test_config;
pub mod test_data;

pub use test_config::TestConfigBuilder;
pub use test_data::*;
