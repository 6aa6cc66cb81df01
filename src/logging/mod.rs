//! Structured logging helpers
//!
//! Components log through `tracing` with the shared field names defined in
//! [`fields`]; this module turns a [`LoggingConfig`](crate::config::LoggingConfig)
//! into an `EnvFilter` directive string.

pub mod fields;

pub use fields::{error_fields, snapshot_summary};

/// Build filter directives string from LoggingConfig
///
/// Constructs a tracing filter string that includes the base log level
/// and any component-specific log levels, sorted by component name.
///
/// # Examples
///
/// ```
/// use fleetsync::config::LoggingConfig;
/// use fleetsync::logging::build_filter_directives;
///
/// let config = LoggingConfig::default().with_component("polling", "debug");
///
/// assert_eq!(build_filter_directives(&config), "info,fleetsync::polling=debug");
/// ```
pub fn build_filter_directives(config: &crate::config::LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    for (component, level) in &config.component_levels {
        filter_str.push_str(&format!(",fleetsync::{}={}", component, level));
    }

    filter_str
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingConfig;

    #[test]
    fn test_filter_base_level_only() {
        let config = LoggingConfig::default();
        assert_eq!(build_filter_directives(&config), "info");
    }

    #[test]
    fn test_filter_components_sorted() {
        let config = LoggingConfig {
            level: "warn".into(),
            ..LoggingConfig::default()
        }
        .with_component("push", "trace")
        .with_component("gateway", "debug");
        assert_eq!(
            build_filter_directives(&config),
            "warn,fleetsync::gateway=debug,fleetsync::push=trace"
        );
    }
}
