//! Push merge channel: applies out-of-band update events to a snapshot.
//!
//! Events are consumed by a single task per attachment and applied strictly
//! in arrival order, without reordering or coalescing. Push merges do not
//! touch the snapshot generation, so they are never discarded as stale; a
//! poll response and a push event touching the same fields resolve as
//! last-writer-wins.

mod merge;
mod source;

pub use merge::{shallow_merge, MergeFn, MergeRegistry};
pub use source::{broadcast_stream, json_lines};

use crate::error::SyncError;
use crate::snapshot::SnapshotStore;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A typed partial update delivered by the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl PushEvent {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }

    /// Parse one JSON message.
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        serde_json::from_str(text).map_err(SyncError::from)
    }
}

/// Keeps a push attachment alive; detaching stops all further merges.
///
/// Dropping the handle detaches.
pub struct DetachHandle {
    cancel: CancellationToken,
    fence: Box<dyn Fn() + Send + Sync>,
    detached: AtomicBool,
    handle: Option<JoinHandle<()>>,
}

impl DetachHandle {
    /// Remove the listener. Once this returns no further merge from this
    /// attachment reaches the store. Calling it again is a no-op.
    pub fn detach(&self) {
        if self.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        (self.fence)();
        tracing::debug!("Push channel detached");
    }

    pub fn is_attached(&self) -> bool {
        !self.detached.load(Ordering::SeqCst)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait until the consumer task exits (stream ended or detached).
    pub async fn finished(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for DetachHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Push merge channel entry point.
pub struct PushChannel;

impl PushChannel {
    /// Consume `events`, merging each event with a registered type into
    /// `store`. Events of unregistered types are ignored; a merge error is
    /// logged and the channel keeps going.
    pub fn attach<T, S>(
        events: S,
        store: Arc<SnapshotStore<T>>,
        registry: MergeRegistry<T>,
    ) -> DetachHandle
    where
        T: Clone + Send + Sync + 'static,
        S: Stream<Item = PushEvent> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task_store = Arc::clone(&store);

        let handle = tokio::spawn(async move {
            let mut events = Box::pin(events);
            loop {
                let event = tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    next = events.next() => match next {
                        Some(event) => event,
                        None => break,
                    },
                };
                apply_event(&task_store, &registry, &task_cancel, event);
            }
            tracing::debug!(domain = %task_store.domain(), "Push consumer stopped");
        });

        DetachHandle {
            cancel,
            fence: Box::new(move || store.fence()),
            detached: AtomicBool::new(false),
            handle: Some(handle),
        }
    }
}

fn apply_event<T>(
    store: &SnapshotStore<T>,
    registry: &MergeRegistry<T>,
    cancel: &CancellationToken,
    event: PushEvent,
) where
    T: Clone + Send + Sync + 'static,
{
    let Some(merge) = registry.get(&event.event_type) else {
        tracing::trace!(event_type = %event.event_type, "No merge registered, ignoring event");
        return;
    };

    match store.apply_push(Some(cancel), |value| merge(value, &event.data)) {
        Ok(changed) => {
            tracing::debug!(
                domain = %store.domain(),
                event_type = %event.event_type,
                changed,
                "Push event merged"
            );
            if changed {
                metrics::counter!(
                    "fleetsync_push_merged_total",
                    "event_type" => event.event_type.clone()
                )
                .increment(1);
            }
        }
        Err(SyncError::Cancelled) => {}
        Err(e) => {
            tracing::warn!(
                domain = %store.domain(),
                event_type = %event.event_type,
                error = %e,
                "Push merge failed"
            );
        }
    }
}
