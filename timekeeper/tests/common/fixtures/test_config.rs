//! Test configuration builder writing a TOML file into a temp directory

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestConfigBuilder {
    temp_dir: TempDir,
    time_zone: String,
    persist_dynamic: bool,
    output_mode: String,
    schedules: Vec<String>,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            time_zone: "UTC".to_string(),
            persist_dynamic: false,
            output_mode: "output1".to_string(),
            schedules: Vec::new(),
        }
    }

    pub fn with_persistence(mut self) -> Self {
        self.persist_dynamic = true;
        self
    }

    pub fn with_output_mode(mut self, mode: &str) -> Self {
        self.output_mode = mode.to_string();
        self
    }

    /// Add a static cron schedule
    pub fn with_cron(mut self, name: &str, expression: &str) -> Self {
        self.schedules.push(format!(
            "[[schedules]]\nname = \"{}\"\nexpression = \"{}\"\n",
            name, expression
        ));
        self
    }

    pub fn persist_dir(&self) -> PathBuf {
        self.temp_dir.path().join("persist")
    }

    pub fn to_toml(&self) -> String {
        let mut toml = format!(
            "name = \"test\"\ninstanceId = \"test-instance\"\ntimeZone = \"{}\"\npersistDynamic = {}\npersistDir = \"{}\"\ncommandResponseMsgOutput = \"{}\"\n\n",
            self.time_zone,
            self.persist_dynamic,
            self.persist_dir().display(),
            self.output_mode
        );
        for schedule in &self.schedules {
            toml.push_str(schedule);
            toml.push('\n');
        }
        toml
    }

    /// Write the config file; the builder keeps the temp directory alive
    pub fn build(self) -> TestConfig {
        let path = self.temp_dir.path().join("timekeeper.toml");
        fs::write(&path, self.to_toml()).expect("Failed to write config");
        TestConfig {
            path,
            persist_dir: self.persist_dir(),
            _temp_dir: self.temp_dir,
        }
    }
}

pub struct TestConfig {
    pub path: PathBuf,
    pub persist_dir: PathBuf,
    _temp_dir: TempDir,
}

impl TestConfig {
    pub fn path_string(&self) -> String {
        self.path.display().to_string()
    }
}
