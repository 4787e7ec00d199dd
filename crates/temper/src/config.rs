//! Configuration management
//!
//! ```toml
//! [general]
//! log_level = "info"
//!
//! [device]
//! timeout_ms = 5000
//!
//! [poll]
//! interval_ms = 300
//! ```
//!
//! Every section and key is optional and falls back to the default.

use crate::poller::DEFAULT_POLL_INTERVAL;
use crate::session::SessionConfig;
use anyhow::{Context, Result, anyhow};
use protocol::DEFAULT_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperConfig {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub poll: PollSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralSettings {
    #[serde(default = "GeneralSettings::default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

impl GeneralSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Timeout for every USB transfer in milliseconds
    #[serde(default = "DeviceSettings::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

impl DeviceSettings {
    fn default_timeout_ms() -> u64 {
        DEFAULT_TIMEOUT.as_millis() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    /// Delay between two readings in milliseconds
    #[serde(default = "PollSettings::default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
        }
    }
}

impl PollSettings {
    fn default_interval_ms() -> u64 {
        DEFAULT_POLL_INTERVAL.as_millis() as u64
    }
}

impl TemperConfig {
    /// Load configuration from the specified path
    ///
    /// Without a path, the standard locations are tried in order.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::candidate_paths()
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?,
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: TemperConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {:#}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("temper-usb").join("temper.toml")
        } else {
            PathBuf::from(".config/temper-usb/temper.toml")
        }
    }

    fn candidate_paths() -> Vec<PathBuf> {
        vec![
            Self::default_path(),
            PathBuf::from("/etc/temper-usb/temper.toml"),
        ]
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.general.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.device.timeout_ms == 0 {
            return Err(anyhow!("device.timeout_ms must be greater than 0"));
        }

        if self.poll.interval_ms == 0 {
            return Err(anyhow!("poll.interval_ms must be greater than 0"));
        }

        Ok(())
    }

    /// Session settings derived from the `[device]` section
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            timeout: Duration::from_millis(self.device.timeout_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }
}

/// Expand a leading `~` in a user supplied path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}
