//! Gate configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Could not find config directory")]
    NoConfigDir,

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Gate application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Base URL of the exam backend
    pub api_base_url: String,

    /// Path of the status endpoint, relative to `api_base_url`
    pub status_path: String,

    /// Path of the verification endpoint, relative to `api_base_url`
    pub verify_path: String,

    /// Upper bound for a single remote call
    pub request_timeout_secs: u64,

    /// Background status polling interval (0 disables polling)
    pub poll_interval_secs: u64,

    /// Location of the durable store (defaults to the data directory)
    pub store_path: Option<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            status_path: "status".to_string(),
            verify_path: "verify".to_string(),
            request_timeout_secs: 10,
            poll_interval_secs: 30,
            store_path: None,
        }
    }
}

impl GateConfig {
    /// Load from the default location, writing defaults on first run
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Wrote default config to {}", config_path.display());
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: GateConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("exam-gate").join("config.json"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = reqwest::Url::parse(&self.api_base_url)
            .map_err(|e| ConfigError::Invalid(format!("api_base_url: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "api_base_url is not a base URL: {}",
                self.api_base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }

    pub fn status_url(&self) -> String {
        join_url(&self.api_base_url, &self.status_path)
    }

    pub fn verify_url(&self) -> String {
        join_url(&self.api_base_url, &self.verify_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = GateConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.status_url(), "http://localhost:8000/api/status");
        assert_eq!(config.verify_url(), "http://localhost:8000/api/verify");
    }

    #[test]
    fn test_url_joining_trims_slashes() {
        let config = GateConfig {
            api_base_url: "https://exam.example.org/api/".to_string(),
            status_path: "/v1/status".to_string(),
            ..Default::default()
        };
        assert_eq!(config.status_url(), "https://exam.example.org/api/v1/status");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_url = GateConfig {
            api_base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad_url.validate(), Err(ConfigError::Invalid(_))));

        let zero_timeout = GateConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(zero_timeout.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_poll_interval_zero_disables() {
        let config = GateConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), None);
        assert_eq!(
            GateConfig::default().poll_interval(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_save_and_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{"api_base_url": "https://exam.example.org"}"#).unwrap();
        let config = GateConfig::load_from(&path).unwrap();
        assert_eq!(config.api_base_url, "https://exam.example.org");
        assert_eq!(config.request_timeout_secs, 10);

        let custom = GateConfig {
            poll_interval_secs: 5,
            store_path: Some(dir.path().join("store.json")),
            ..config
        };
        custom.save_to(&path).unwrap();
        assert_eq!(GateConfig::load_from(&path).unwrap(), custom);
    }
}
