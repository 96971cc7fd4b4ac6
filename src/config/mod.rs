//! Configuration module for streamblocks
//!
//! The application config is a TOML file describing logging, channel
//! capacities and the units to spawn at startup:
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [broadcast]
//! capacity = 1024
//! policy = "drop_oldest"
//!
//! [[units]]
//! name = "clf"
//! kind = "LogisticModel"
//! seed = 7
//! rule = { Weights = [2.0], FeaturePaths = ["x"] }
//!
//! [[units]]
//! name = "blink"
//! kind = "Toggle"
//! ```
//!
//! # App Data Location
//!
//! Without an explicit path the config is read from the platform data
//! directory:
//! - **Linux**: `~/.local/share/dev.hxyulin.streamblocks/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.streamblocks/config.toml`
//! - **Windows**: `%APPDATA%\dev.hxyulin.streamblocks\config.toml`

use crate::error::{Result, UnitError};
use crate::unit::bridge::{MAILBOX_CAPACITY, REPORT_CAPACITY};
use crate::unit::broadcast::{OverflowPolicy, DEFAULT_SUBSCRIBER_CAPACITY};
use crate::unit::kind::UnitKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.streamblocks";

/// Config filename inside the app data directory
pub const CONFIG_FILE: &str = "config.toml";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Sections ====================

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write a daily-rolling log file here as well as to stderr
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

/// Inbound mailbox settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxConfig {
    #[serde(default = "default_mailbox_capacity")]
    pub capacity: usize,
}

fn default_mailbox_capacity() -> usize {
    MAILBOX_CAPACITY
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            capacity: MAILBOX_CAPACITY,
        }
    }
}

/// Output fan-out settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Per-subscriber buffer size
    #[serde(default = "default_broadcast_capacity")]
    pub capacity: usize,

    #[serde(default)]
    pub policy: OverflowPolicy,
}

fn default_broadcast_capacity() -> usize {
    DEFAULT_SUBSCRIBER_CAPACITY
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            policy: OverflowPolicy::default(),
        }
    }
}

/// Error report channel settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_report_capacity")]
    pub capacity: usize,
}

fn default_report_capacity() -> usize {
    REPORT_CAPACITY
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            capacity: REPORT_CAPACITY,
        }
    }
}

/// One unit to spawn at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    pub name: String,

    /// Kind string, e.g. `"LogisticModel"`
    pub kind: String,

    /// Seed for the unit's sample source. Entropy when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Initial rule, applied as an ordinary update right after spawn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<serde_json::Value>,
}

impl UnitConfig {
    pub fn new(name: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            name: name.into(),
            kind: kind.name().to_string(),
            seed: None,
            rule: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_rule(mut self, rule: serde_json::Value) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Parse the kind string.
    pub fn unit_kind(&self) -> Result<UnitKind> {
        self.kind.parse()
    }
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub mailbox: MailboxConfig,

    #[serde(default)]
    pub broadcast: BroadcastConfig,

    #[serde(default)]
    pub reports: ReportsConfig,

    #[serde(default)]
    pub units: Vec<UnitConfig>,
}

impl AppConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            UnitError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::from_toml(&content)?;
        tracing::info!(
            "Loaded config from {} ({} units)",
            path.display(),
            config.units.len()
        );
        Ok(config)
    }

    /// Parse and validate config text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| UnitError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the app data directory, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| UnitError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| UnitError::Config(format!("Failed to write config: {}", e)))
    }

    /// Check unit names are unique, kinds are known and capacities non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.mailbox.capacity == 0 {
            return Err(UnitError::Config("mailbox.capacity must be > 0".into()));
        }
        if self.broadcast.capacity == 0 {
            return Err(UnitError::Config("broadcast.capacity must be > 0".into()));
        }
        if self.reports.capacity == 0 {
            return Err(UnitError::Config("reports.capacity must be > 0".into()));
        }

        let mut names = HashSet::new();
        for unit in &self.units {
            if unit.name.is_empty() {
                return Err(UnitError::Config("unit name must not be empty".into()));
            }
            if !names.insert(unit.name.as_str()) {
                return Err(UnitError::Config(format!(
                    "duplicate unit name '{}'",
                    unit.name
                )));
            }
            unit.unit_kind()?;
        }
        Ok(())
    }

    /// Look up a unit entry by name
    pub fn unit(&self, name: &str) -> Option<&UnitConfig> {
        self.units.iter().find(|u| u.name == name)
    }
}
