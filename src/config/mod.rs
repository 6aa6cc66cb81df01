//! Configuration module for fleetsync
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`FLEETSYNC_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use fleetsync::config::FleetSyncConfig;
//!
//! let config = FleetSyncConfig::default();
//! assert_eq!(config.history.capacity, 60);
//!
//! let toml = r#"
//! [api]
//! base_url = "https://vpn.example.com/api"
//! "#;
//! let config: FleetSyncConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.api.base_url, "https://vpn.example.com/api");
//! assert_eq!(config.paging.page_size, 20);
//! ```

pub mod display;
pub mod error;
pub mod logging;

pub use display::{HistoryConfig, PagingConfig};
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};

// Re-export the component configs that live next to their components
pub use crate::gateway::ApiConfig;
pub use crate::polling::{PollingConfig, RetryPolicy, WidgetConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Unified configuration for the sync layer and its CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FleetSyncConfig {
    /// Backend API connection
    pub api: ApiConfig,
    /// Polled widgets and retry behavior
    pub polling: PollingConfig,
    /// Rolling buffer settings
    pub history: HistoryConfig,
    /// Listing screens
    pub paging: PagingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl FleetSyncConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (the current value is kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("FLEETSYNC_API_URL") {
            if !url.trim().is_empty() {
                self.api.base_url = url;
            }
        }

        if let Ok(level) = std::env::var("FLEETSYNC_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("FLEETSYNC_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(capacity) = std::env::var("FLEETSYNC_HISTORY_CAPACITY") {
            if let Ok(c) = capacity.parse() {
                self.history.capacity = c;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("api.base_url", "URL cannot be empty"));
        }

        if self.history.capacity == 0 {
            return Err(ConfigError::invalid(
                "history.capacity",
                "capacity must be at least 1",
            ));
        }

        if self.paging.page_size == 0 {
            return Err(ConfigError::invalid(
                "paging.page_size",
                "page size must be non-zero",
            ));
        }

        self.logging.validate()?;

        let mut seen = HashSet::new();
        for (i, widget) in self.polling.widgets.iter().enumerate() {
            if widget.name.is_empty() {
                return Err(ConfigError::invalid(
                    format!("polling.widgets[{}].name", i),
                    "name cannot be empty",
                ));
            }
            if widget.interval_ms == 0 {
                return Err(ConfigError::invalid(
                    format!("polling.widgets[{}].interval_ms", i),
                    "interval must be non-zero",
                ));
            }
            if !seen.insert(widget.name.as_str()) {
                return Err(ConfigError::invalid(
                    format!("polling.widgets[{}].name", i),
                    format!("duplicate widget name '{}'", widget.name),
                ));
            }
        }

        Ok(())
    }
}
