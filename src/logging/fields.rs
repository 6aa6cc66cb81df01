//! Field extraction helpers for structured logging

use crate::error::SyncError;
use crate::snapshot::{Snapshot, SnapshotStatus};

/// Split an error into `(kind, detail)` log fields.
///
/// # Examples
///
/// ```
/// use fleetsync::error::SyncError;
/// use fleetsync::logging::error_fields;
///
/// let (kind, detail) = error_fields(&SyncError::AuthExpired);
/// assert_eq!(kind, "auth_expired");
/// assert!(!detail.is_empty());
/// ```
pub fn error_fields(error: &SyncError) -> (&'static str, String) {
    (error.kind(), error.to_string())
}

/// One-line description of a snapshot for transition logs, e.g.
/// `ready gen=3 pending=1`.
pub fn snapshot_summary<T>(snapshot: &Snapshot<T>) -> String {
    let status = match snapshot.status {
        SnapshotStatus::Idle => "idle",
        SnapshotStatus::Loading => "loading",
        SnapshotStatus::Ready => "ready",
        SnapshotStatus::Error => "error",
    };
    let mut summary = format!("{} gen={}", status, snapshot.generation);
    if !snapshot.pending.is_empty() {
        summary.push_str(&format!(" pending={}", snapshot.pending.len()));
    }
    if let Some(error) = &snapshot.error {
        summary.push_str(&format!(" error=\"{}\"", error));
    }
    summary
}
