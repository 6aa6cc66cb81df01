//! Listing and chart display settings.

use crate::history::DEFAULT_CAPACITY;
use crate::paging::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};

/// Time-series widgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Samples kept per rolling buffer
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Paged listing screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub page_size: u32,
    /// Endpoint of the user listing
    pub users_path: String,
    /// Endpoint accepting `{action, ids}` bulk requests for users
    pub users_bulk_path: String,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            users_path: "/users".to_string(),
            users_bulk_path: "/users/bulk-action".to_string(),
        }
    }
}
