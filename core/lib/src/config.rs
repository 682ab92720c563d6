use crate::project::ProjectRoot;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "ebi.toml";

/// Optional `.elasticbeanstalk/ebi.toml` settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EbiConfig {
    /// Executable of the wrapped Elastic Beanstalk CLI.
    pub eb_command: String,
    pub clone_timeout_minutes: u32,
    pub create_timeout_minutes: u32,
    pub config_put_timeout_minutes: u32,
    pub capacity: CapacityConfig,
    pub defaults: DefaultsConfig,
    /// Directory for JSON-lines step logs; nothing is written when unset.
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CapacityConfig {
    pub poll_interval_seconds: u64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    pub profile: Option<String>,
    pub region: Option<String>,
}

impl Default for EbiConfig {
    fn default() -> Self {
        Self {
            eb_command: "eb".to_string(),
            clone_timeout_minutes: 45,
            create_timeout_minutes: 45,
            config_put_timeout_minutes: 45,
            capacity: CapacityConfig::default(),
            defaults: DefaultsConfig::default(),
            log_dir: None,
        }
    }
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 30,
            timeout_seconds: 20 * 60,
        }
    }
}

impl CapacityConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl EbiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::FileRead(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EbiConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `ebi.toml` from the project, falling back to defaults when there is
    /// no project or no file.
    pub fn load(project: Option<&ProjectRoot>) -> Result<Self, ConfigError> {
        match project.map(|p| p.beanstalk_dir().join(CONFIG_FILE_NAME)) {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading ebi configuration");
                Self::load_from_file(path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.eb_command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "eb_command cannot be empty".to_string(),
            ));
        }

        for (field, value) in [
            ("clone_timeout_minutes", self.clone_timeout_minutes),
            ("create_timeout_minutes", self.create_timeout_minutes),
            ("config_put_timeout_minutes", self.config_put_timeout_minutes),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "{} must be at least 1",
                    field
                )));
            }
        }

        if self.capacity.poll_interval_seconds == 0 {
            return Err(ConfigError::Validation(
                "capacity.poll_interval_seconds must be at least 1".to_string(),
            ));
        }

        if self.capacity.timeout_seconds < self.capacity.poll_interval_seconds {
            return Err(ConfigError::Validation(
                "capacity.timeout_seconds must not be shorter than capacity.poll_interval_seconds"
                    .to_string(),
            ));
        }

        for (field, value) in [
            ("defaults.profile", &self.defaults.profile),
            ("defaults.region", &self.defaults.region),
        ] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "{} cannot be empty when set",
                    field
                )));
            }
        }

        Ok(())
    }
}

/// Configuration related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    Validation(String),
}
