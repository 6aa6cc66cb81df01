//! Configuration for polled widgets.

use crate::gateway::ApiRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// What the scheduler does after a failed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry on the next regular tick, no matter how many failures
    #[default]
    Fixed,
    /// Double the delay after each consecutive failure, up to the cap
    Exponential,
}

impl RetryPolicy {
    /// Delay before the next tick given the consecutive failure count.
    pub fn next_delay(self, interval: Duration, failures: u32, max_backoff: Duration) -> Duration {
        match self {
            RetryPolicy::Fixed => interval,
            RetryPolicy::Exponential => {
                let factor = 2u32.saturating_pow(failures.min(16));
                interval.saturating_mul(factor).min(max_backoff.max(interval))
            }
        }
    }
}

impl std::str::FromStr for RetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(RetryPolicy::Fixed),
            "exponential" => Ok(RetryPolicy::Exponential),
            _ => Err(format!("Invalid retry policy: {}", s)),
        }
    }
}

/// One polled endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub name: String,
    pub path: String,
    pub interval_ms: u64,
    /// Extra query parameters sent on every poll (e.g. `days = "7"`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
}

impl WidgetConfig {
    pub fn new(name: &str, path: &str, interval_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            interval_ms,
            query: BTreeMap::new(),
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// GET request for this widget's endpoint with its query parameters.
    pub fn request(&self) -> ApiRequest {
        ApiRequest::get(&self.path).with_params(self.query.clone())
    }
}

/// Polling settings shared by every widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub retry: RetryPolicy,
    /// Upper bound on the exponential backoff delay
    pub max_backoff_ms: u64,
    pub widgets: Vec<WidgetConfig>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::Fixed,
            max_backoff_ms: 60_000,
            widgets: vec![
                WidgetConfig::new("dashboard", "/dashboard", 30_000),
                WidgetConfig::new("traffic_stats", "/traffic-stats", 60_000).with_query("days", "7"),
                WidgetConfig::new("traffic_by_type", "/traffic-by-type", 60_000)
                    .with_query("days", "7"),
                WidgetConfig::new("network_speed", "/network-speed", 2_000),
                WidgetConfig::new("notifications", "/notifications", 30_000),
            ],
        }
    }
}

impl PollingConfig {
    pub fn widget(&self, name: &str) -> Option<&WidgetConfig> {
        self.widgets.iter().find(|w| w.name == name)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_policy_ignores_failures() {
        let d = RetryPolicy::Fixed.next_delay(
            Duration::from_secs(2),
            10,
            Duration::from_secs(60),
        );
        assert_eq!(d, Duration::from_secs(2));
    }

    #[test]
    fn test_exponential_policy_doubles_and_caps() {
        let interval = Duration::from_secs(2);
        let cap = Duration::from_secs(10);
        let policy = RetryPolicy::Exponential;
        assert_eq!(policy.next_delay(interval, 0, cap), Duration::from_secs(2));
        assert_eq!(policy.next_delay(interval, 1, cap), Duration::from_secs(4));
        assert_eq!(policy.next_delay(interval, 2, cap), Duration::from_secs(8));
        assert_eq!(policy.next_delay(interval, 3, cap), cap);
        assert_eq!(policy.next_delay(interval, 40, cap), cap);
    }

    #[test]
    fn test_default_widgets() {
        let config = PollingConfig::default();
        assert_eq!(config.widgets.len(), 5);
        let traffic = config.widget("traffic_stats").unwrap();
        assert_eq!(traffic.query.get("days").map(String::as_str), Some("7"));
        assert_eq!(
            config.widget("network_speed").unwrap().interval(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_retry_policy_from_str() {
        use std::str::FromStr;
        assert_eq!(RetryPolicy::from_str("EXPONENTIAL").unwrap(), RetryPolicy::Exponential);
        assert!(RetryPolicy::from_str("linear").is_err());
    }
}
