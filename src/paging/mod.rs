//! Paged query controller for listing screens (users, logs).
//!
//! Holds the current [`PageQuery`], fetches the matching page into a
//! [`SnapshotStore`], and keeps filter changes from leaving the view on a
//! page that no longer exists. Every fetch starts a new store generation, so
//! a slow response for an older query never overwrites a newer one.

mod query;

pub use query::{PageQuery, QueryPatch, SortDirection, SortSpec};

use crate::error::SyncError;
use crate::gateway::{ApiRequest, FetchGateway};
use crate::snapshot::{EntityMap, FetchApplied, Identified, SnapshotStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// One page of results plus the totals needed for navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<E> Page<E> {
    pub fn new(items: Vec<E>, total: u64, page: u32, page_size: u32) -> Self {
        Self {
            items,
            total,
            page,
            page_size,
            total_pages: total_pages(total, page_size),
        }
    }

    /// Clamp a requested page number into `[1, total_pages]`.
    pub fn clamp(&self, page: u32) -> u32 {
        page.clamp(1, self.total_pages.max(1))
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// `ceil(total / page_size)`; zero when there is nothing to show.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

impl<E> EntityMap for Page<E>
where
    E: Identified + Clone + PartialEq + Send + Sync + 'static,
{
    type Entity = E;

    fn get_entity(&self, id: &str) -> Option<E> {
        self.items.get_entity(id)
    }

    fn put_entity(&mut self, id: &str, entity: Option<E>) {
        self.items.put_entity(id, entity);
    }
}

/// List payload as returned by the backend. The collection key differs per
/// endpoint.
#[derive(Debug, Deserialize)]
struct PageEnvelope<E> {
    #[serde(alias = "users", alias = "logs", alias = "data", alias = "results")]
    items: Vec<E>,
    #[serde(default, alias = "count", alias = "total_count")]
    total: Option<u64>,
}

/// Decode a list response for `query`. A bare array is treated as the whole
/// result set.
pub fn decode_page<E>(data: Value, query: &PageQuery) -> Result<Page<E>, SyncError>
where
    E: DeserializeOwned,
{
    let (items, total) = match data {
        Value::Array(_) => {
            let items: Vec<E> = serde_json::from_value(data)?;
            let total = items.len() as u64;
            (items, total)
        }
        other => {
            let envelope: PageEnvelope<E> = serde_json::from_value(other)?;
            let total = envelope
                .total
                .unwrap_or(envelope.items.len() as u64);
            (envelope.items, total)
        }
    };
    Ok(Page::new(items, total, query.page, query.page_size))
}

/// Drives one paged listing.
pub struct PagedQueryController<E> {
    gateway: Arc<dyn FetchGateway>,
    path: String,
    store: Arc<SnapshotStore<Page<E>>>,
    query: Mutex<PageQuery>,
}

impl<E> PagedQueryController<E>
where
    E: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(gateway: Arc<dyn FetchGateway>, path: impl Into<String>, page_size: u32) -> Self {
        let path = path.into();
        let domain = path.trim_start_matches('/').replace('/', ".");
        Self::with_store(
            gateway,
            path,
            Arc::new(SnapshotStore::new(domain)),
            PageQuery::new(page_size),
        )
    }

    pub fn with_store(
        gateway: Arc<dyn FetchGateway>,
        path: impl Into<String>,
        store: Arc<SnapshotStore<Page<E>>>,
        query: PageQuery,
    ) -> Self {
        Self {
            gateway,
            path: path.into(),
            store,
            query: Mutex::new(query),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore<Page<E>>> {
        &self.store
    }

    pub fn query(&self) -> PageQuery {
        self.query
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Merge `patch` into the query and fetch the resulting page.
    ///
    /// Changing anything other than the page lands on page 1. A page-only
    /// patch is clamped to the range of the last loaded page. Returns
    /// `Err(Stale)` if a newer query was issued before this one settled.
    pub async fn set_query(&self, mut patch: QueryPatch) -> Result<Page<E>, SyncError> {
        if patch.is_navigation() {
            if let (Some(page), Some(current)) = (patch.page, self.store.value()) {
                patch.page = Some(current.clamp(page));
            }
        }
        let query = {
            let mut guard = self.query.lock().unwrap_or_else(PoisonError::into_inner);
            let mut next = guard.clone();
            next.apply(patch)?;
            *guard = next.clone();
            next
        };
        self.fetch(query).await
    }

    /// Navigate to `page`, clamped to the known page range.
    pub async fn go_to_page(&self, page: u32) -> Result<Page<E>, SyncError> {
        self.set_query(QueryPatch::page(page)).await
    }

    pub async fn next_page(&self) -> Result<Page<E>, SyncError> {
        let page = self.query().page.saturating_add(1);
        self.go_to_page(page).await
    }

    pub async fn prev_page(&self) -> Result<Page<E>, SyncError> {
        let page = self.query().page.saturating_sub(1);
        self.go_to_page(page).await
    }

    /// Refetch the current query.
    pub async fn refresh(&self) -> Result<Page<E>, SyncError> {
        let query = self.query();
        self.fetch(query).await
    }

    async fn fetch(&self, query: PageQuery) -> Result<Page<E>, SyncError> {
        let generation = self.store.begin_fetch();
        tracing::debug!(
            path = %self.path,
            page = query.page,
            page_size = query.page_size,
            generation,
            "Fetching page"
        );

        let request = ApiRequest::get(&self.path).with_params(query.to_params());
        let result = self
            .gateway
            .send(request)
            .await
            .and_then(|response| decode_page(response.data, &query));

        let outcome = match &result {
            Ok(_) => "ready",
            Err(_) => "failed",
        };
        let applied = self.store.complete_fetch(generation, result.clone());
        metrics::counter!(
            "fleetsync_fetch_total",
            "domain" => self.store.domain().to_string(),
            "outcome" => outcome
        )
        .increment(1);

        match applied {
            FetchApplied::Ready | FetchApplied::Failed => result,
            FetchApplied::Stale => Err(SyncError::Stale {
                generation,
                current: self.store.generation(),
            }),
            FetchApplied::Cancelled => Err(SyncError::Cancelled),
        }
    }
}
