//! Logging configuration

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Modules that accept a component level override.
pub const COMPONENTS: &[&str] = &[
    "bulk", "cli", "gateway", "history", "mutation", "paging", "polling", "push", "snapshot",
    "widgets",
];

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// `[logging]` section: base level, output format and per-module levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Keyed by module name, e.g. `polling = "debug"`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub component_levels: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            component_levels: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    pub fn with_component(mut self, component: &str, level: &str) -> Self {
        self.component_levels
            .insert(component.to_string(), level.to_string());
        self
    }

    /// Reject unknown modules and level names before they reach the filter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("unknown level '{}'", self.level),
            ));
        }
        for (component, level) in &self.component_levels {
            if !COMPONENTS.contains(&component.as_str()) {
                return Err(ConfigError::invalid(
                    format!("logging.component_levels.{}", component),
                    format!("unknown component, expected one of: {}", COMPONENTS.join(", ")),
                ));
            }
            if !LEVELS.contains(&level.to_lowercase().as_str()) {
                return Err(ConfigError::invalid(
                    format!("logging.component_levels.{}", component),
                    format!("unknown level '{}'", level),
                ));
            }
        }
        Ok(())
    }
}
