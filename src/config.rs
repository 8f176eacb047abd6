use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_AUTOSAVE_SECS: u64 = 30;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub server_url: Option<String>,
    pub autosave_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_secs(self.autosave_secs.unwrap_or(DEFAULT_AUTOSAVE_SECS))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("markpad").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.server_url(), DEFAULT_SERVER_URL);
        assert_eq!(config.autosave_delay(), Duration::from_secs(30));
    }

    #[test]
    fn round_trips_through_the_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            server_url: Some("http://10.0.0.2:8080".to_string()),
            autosave_secs: Some(5),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.server_url(), "http://10.0.0.2:8080");
        assert_eq!(loaded.autosave_delay(), Duration::from_secs(5));
    }
}
