//! Fleetplane configuration
//!
//! Every tunable in one place. Loaded from TOML at startup; a missing file
//! means defaults, a malformed one is an error.

use anyhow::Context;
use fleetplane_changes::ChangesOptions;
use fleetplane_eventbus::DEFAULT_CHANNEL_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FleetConfig {
    pub eventbus: EventBusConfig,
    pub changes: ChangesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventBusConfig {
    /// Events buffered per subscriber before further events are dropped for it.
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChangesConfig {
    /// Most raw events folded into one delivered batch.
    pub batch_size: usize,
    /// Attach query completions to batches.
    pub suggestions: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `info` or `fleetplane_store=debug`.
    pub level: String,
    pub format: LogFormat,
    /// Write to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for ChangesConfig {
    fn default() -> Self {
        Self {
            batch_size: fleetplane_changes::subscription::DEFAULT_BATCH_SIZE,
            suggestions: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl FleetConfig {
    /// Load config from a TOML file, falling back to defaults if it does not
    /// exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// The current config as TOML, e.g. to write out a default file.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Subscription options carrying the configured defaults.
    pub fn changes_options(&self) -> ChangesOptions {
        ChangesOptions::new()
            .with_batch_size(self.changes.batch_size)
            .with_suggestions(self.changes.suggestions)
            .with_capacity(self.eventbus.channel_capacity)
    }
}
