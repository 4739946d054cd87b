use super::Config;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_path: String) -> Result<Self> {
        let config = Self::load_configuration(&config_path).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    async fn load_configuration(config_path: &str) -> Result<Config> {
        debug!("Loading config: {}", config_path);
        let content = fs::read_to_string(config_path)
            .await
            .map_err(|e| anyhow!("Failed to read config {}: {}", config_path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config {}: {}", config_path, e))?;

        config
            .validate()
            .map_err(|e| anyhow!("Invalid config {}: {}", config_path, e))?;

        info!(
            "Loaded config '{}' with {} static schedules",
            config.name,
            config.schedules.len()
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timekeeper.toml");
        std::fs::write(
            &path,
            "timeZone = \"UTC\"\n[[schedules]]\nname = \"tick\"\nexpression = \"*/10 * * * * *\"\n",
        )
        .unwrap();

        let manager = ConfigManager::new(path.display().to_string()).await.unwrap();
        let config = manager.get_current_config();
        assert_eq!(config.schedules[0].name, "tick");
    }

    #[tokio::test]
    async fn test_missing_file_names_path() {
        let err = ConfigManager::new("/nonexistent/timekeeper.toml".to_string())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/timekeeper.toml"));
    }
}
