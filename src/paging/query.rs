//! Page/filter/search/sort parameters for listing screens.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(format!("Invalid sort direction: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Full query state of a listing screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
    pub status_filter: Option<String>,
    pub sort: Option<SortSpec>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::new(20)
    }
}

impl PageQuery {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            search: None,
            status_filter: None,
            sort: None,
        }
    }

    /// Merge `patch` into this query.
    ///
    /// Any field other than `page` present in the patch resets `page` to 1;
    /// an explicit `page` in the same patch still wins. Blank search or
    /// status strings clear the filter.
    pub fn apply(&mut self, patch: QueryPatch) -> Result<(), SyncError> {
        if patch.page_size == Some(0) {
            return Err(SyncError::InvalidConfig("page size must be positive".into()));
        }

        let resets_page = patch.page_size.is_some()
            || patch.search.is_some()
            || patch.status_filter.is_some()
            || patch.sort.is_some();

        if let Some(size) = patch.page_size {
            self.page_size = size;
        }
        if let Some(search) = patch.search {
            self.search = normalize(search);
        }
        if let Some(status) = patch.status_filter {
            self.status_filter = normalize(status);
        }
        if let Some(sort) = patch.sort {
            self.sort = sort;
        }
        if resets_page {
            self.page = 1;
        }
        if let Some(page) = patch.page {
            self.page = page.max(1);
        }
        Ok(())
    }

    /// Query serialized as request parameters.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("page".to_string(), self.page.to_string()),
            ("page_size".to_string(), self.page_size.to_string()),
        ];
        if let Some(search) = &self.search {
            params.push(("search".to_string(), search.clone()));
        }
        if let Some(status) = &self.status_filter {
            params.push(("status".to_string(), status.clone()));
        }
        if let Some(sort) = &self.sort {
            params.push(("sort_by".to_string(), sort.field.clone()));
            params.push(("sort_order".to_string(), sort.direction.as_str().to_string()));
        }
        params
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Partial update to a [`PageQuery`]. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPatch {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<Option<String>>,
    pub status_filter: Option<Option<String>>,
    pub sort: Option<Option<SortSpec>>,
}

impl QueryPatch {
    /// Pure page navigation.
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }

    pub fn search(search: impl Into<String>) -> Self {
        Self {
            search: Some(Some(search.into())),
            ..Self::default()
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status_filter: Some(Some(status.into())),
            ..Self::default()
        }
    }

    pub fn sort(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            sort: Some(Some(SortSpec::new(field, direction))),
            ..Self::default()
        }
    }

    pub fn page_size(page_size: u32) -> Self {
        Self {
            page_size: Some(page_size),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: Option<String>) -> Self {
        self.status_filter = Some(status);
        self
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.page.is_some()
            && self.page_size.is_none()
            && self.search.is_none()
            && self.status_filter.is_none()
            && self.sort.is_none()
    }
}
