//! Thin widget consumers built on the sync layer.
//!
//! Each widget only names its endpoints and how a response folds into its
//! snapshot; scheduling, staleness and cancellation live in the shared
//! components.

mod dashboard;
mod network;
mod notifications;

pub use dashboard::DashboardWidgets;
pub use network::{sample_from_json, NetworkSpeedWidget};
pub use notifications::{Notification, NotificationCenter};

use crate::error::SyncError;
use crate::polling::{PollingConfig, WidgetConfig};

/// Look up a widget's endpoint configuration by name.
pub(crate) fn widget_config(polling: &PollingConfig, name: &str) -> Result<WidgetConfig, SyncError> {
    polling
        .widget(name)
        .cloned()
        .ok_or_else(|| SyncError::InvalidConfig(format!("no widget named '{}' configured", name)))
}
