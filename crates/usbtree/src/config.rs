//! usbtree configuration management

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Upper bound for the poll interval (one hour)
const MAX_POLL_INTERVAL_MS: u64 = 3_600_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbTreeConfig {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub scan: ScanSettings,
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
pub struct ScanSettings {
    /// Delay between rescans in watch mode
    #[serde(default = "ScanSettings::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Print full descriptor dumps under every device
    #[serde(default)]
    pub dump_descriptors: bool,
    /// Hide the host controllers' root hubs (VID 0x1d6b, class 9)
    #[serde(default)]
    pub skip_root_hubs: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            dump_descriptors: false,
            skip_root_hubs: false,
        }
    }
}

impl ScanSettings {
    fn default_poll_interval_ms() -> u64 {
        1000
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl UsbTreeConfig {
    /// Load configuration from the specified path
    ///
    /// Without a path, the user config directory is tried first, then
    /// `/etc/usbtree/usbtree.toml`.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/usbtree/usbtree.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: UsbTreeConfig = toml::from_str(&content)
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
                tracing::debug!("Failed to load config: {}, using defaults", e);
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
            config_dir.join("usbtree").join("usbtree.toml")
        } else {
            PathBuf::from(".config/usbtree/usbtree.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.general.log_level,
                VALID_LOG_LEVELS.join(", ")
            ));
        }

        if self.scan.poll_interval_ms == 0 || self.scan.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(anyhow!(
                "Invalid poll_interval_ms {}, must be between 1 and {}",
                self.scan.poll_interval_ms,
                MAX_POLL_INTERVAL_MS
            ));
        }

        Ok(())
    }
}
