//! Bulk action executor: one remote call for a whole selection.
//!
//! The call is treated as all-or-nothing. On success the selection is
//! cleared and the listing refetched; on failure the selection is left as
//! it was so the user can retry.

mod selection;

pub use selection::SelectionSet;

use crate::error::SyncError;
use crate::gateway::{ApiRequest, FetchGateway};
use crate::paging::{Page, PagedQueryController};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

/// Result of a bulk action the server accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOutcome {
    pub action: String,
    pub ids: Vec<String>,
    /// Server response body, uninterpreted
    pub response: Value,
    /// Set when the follow-up listing refresh failed. The action itself
    /// still succeeded.
    pub refresh_error: Option<SyncError>,
}

/// Executes named bulk actions against an endpoint and refreshes the
/// listing it belongs to.
pub struct BulkActionExecutor<E> {
    gateway: Arc<dyn FetchGateway>,
    path: String,
    controller: Arc<PagedQueryController<E>>,
}

impl<E> BulkActionExecutor<E>
where
    E: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(
        gateway: Arc<dyn FetchGateway>,
        path: impl Into<String>,
        controller: Arc<PagedQueryController<E>>,
    ) -> Self {
        Self {
            gateway,
            path: path.into(),
            controller,
        }
    }

    /// Run `action` over every id in `selection`.
    pub async fn execute(
        &self,
        action: &str,
        selection: &mut SelectionSet,
    ) -> Result<BulkOutcome, SyncError> {
        if selection.is_empty() {
            return Err(SyncError::EmptySelection);
        }

        let ids = selection.to_vec();
        let body = json!({
            "action": action,
            "ids": ids.iter().map(|id| id_value(id)).collect::<Vec<_>>(),
        });

        let response = match self.gateway.send(ApiRequest::post(&self.path, body)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    action,
                    count = ids.len(),
                    error = %e,
                    "Bulk action failed, selection kept"
                );
                return Err(e);
            }
        };

        selection.clear();
        tracing::info!(action, count = ids.len(), "Bulk action applied");

        let refresh_error = match self.controller.refresh().await {
            Ok(_) => None,
            Err(e) if e.is_stale() => None,
            Err(e) => {
                tracing::warn!(action, error = %e, "Refresh after bulk action failed");
                Some(e)
            }
        };

        Ok(BulkOutcome {
            action: action.to_string(),
            ids,
            response: response.data,
            refresh_error,
        })
    }

    pub fn controller(&self) -> &Arc<PagedQueryController<E>> {
        &self.controller
    }

    /// Current page, if one has been loaded.
    pub fn page(&self) -> Option<Page<E>> {
        self.controller.store().value()
    }
}

/// Numeric ids go over the wire as numbers.
fn id_value(id: &str) -> Value {
    id.parse::<i64>().map(Value::from).unwrap_or_else(|_| Value::from(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ApiResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct BulkFake {
        fail_bulk: bool,
        requests: Mutex<Vec<ApiRequest>>,
    }

    #[async_trait]
    impl FetchGateway for BulkFake {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SyncError> {
            self.requests.lock().unwrap().push(request.clone());
            if request.path == "/users/bulk" {
                if self.fail_bulk {
                    return Err(SyncError::Http {
                        status: 500,
                        detail: "bulk failed".into(),
                    });
                }
                return Ok(ApiResponse::ok(json!({"updated": 3})));
            }
            Ok(ApiResponse::ok(json!({"users": [{"id": 3}], "total": 1})))
        }
    }

    fn executor(fail_bulk: bool) -> (Arc<BulkFake>, BulkActionExecutor<Value>) {
        let fake = Arc::new(BulkFake {
            fail_bulk,
            requests: Mutex::new(Vec::new()),
        });
        let controller = Arc::new(PagedQueryController::new(fake.clone(), "/users", 20));
        let exec = BulkActionExecutor::new(fake.clone(), "/users/bulk", controller);
        (fake, exec)
    }

    #[test]
    fn test_id_value() {
        assert_eq!(id_value("7"), json!(7));
        assert_eq!(id_value("wg-a"), json!("wg-a"));
    }

    #[tokio::test]
    async fn test_success_clears_selection_and_refreshes() {
        let (fake, exec) = executor(false);
        let mut selection: SelectionSet = ["3", "7", "9"].into_iter().collect();

        let outcome = exec.execute("disable", &mut selection).await.unwrap();
        assert!(selection.is_empty());
        assert_eq!(outcome.ids, vec!["3", "7", "9"]);
        assert!(outcome.refresh_error.is_none());

        let requests = fake.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].body,
            Some(json!({"action": "disable", "ids": [3, 7, 9]}))
        );
        assert_eq!(requests[1].path, "/users");
        drop(requests);
        assert!(exec.page().is_some());
    }

    #[tokio::test]
    async fn test_failure_keeps_selection() {
        let (fake, exec) = executor(true);
        let mut selection: SelectionSet = ["3", "7"].into_iter().collect();

        let err = exec.execute("delete", &mut selection).await.unwrap_err();
        assert!(matches!(err, SyncError::Http { status: 500, .. }));
        assert_eq!(selection.len(), 2);
        assert_eq!(fake.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_selection_rejected() {
        let (fake, exec) = executor(false);
        let mut selection = SelectionSet::new();
        assert_eq!(
            exec.execute("enable", &mut selection).await.unwrap_err(),
            SyncError::EmptySelection
        );
        assert!(fake.requests.lock().unwrap().is_empty());
    }
}
