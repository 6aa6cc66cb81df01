//! Shared test utilities for fleetsync integration tests.
//!
//! Provides a gateway pointed at a wiremock server, user-row builders and
//! small polling helpers.

#![allow(dead_code)]

use fleetsync::gateway::{FetchGateway, HttpGateway};
use fleetsync::snapshot::{Snapshot, SnapshotStatus, SnapshotStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

// =============================================================================
// Gateways
// =============================================================================

/// HTTP gateway talking to `server` with a short client timeout.
pub fn gateway_for(server: &MockServer) -> Arc<dyn FetchGateway> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    Arc::new(HttpGateway::with_client(server.uri(), client))
}

// =============================================================================
// Payload Builders
// =============================================================================

/// A user row as the listing endpoint returns it.
pub fn user(id: u64, status: &str) -> Value {
    json!({
        "id": id,
        "username": format!("user{}", id),
        "status": status,
    })
}

/// `{"users": [...], "total": n}` listing body.
pub fn users_body(rows: Vec<Value>, total: u64) -> Value {
    json!({ "users": rows, "total": total })
}

// =============================================================================
// Waiting
// =============================================================================

/// Poll `store` until `done` holds or `timeout` elapses; returns the last
/// snapshot seen.
pub async fn wait_for<T, F>(store: &SnapshotStore<T>, timeout: Duration, done: F) -> Snapshot<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&Snapshot<T>) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let snapshot = store.current();
        if done(&snapshot) || tokio::time::Instant::now() >= deadline {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// True once the snapshot has settled (ready or errored).
pub fn settled<T>(snapshot: &Snapshot<T>) -> bool {
    matches!(snapshot.status, SnapshotStatus::Ready | SnapshotStatus::Error)
}
