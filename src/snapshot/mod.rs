//! Snapshot store: the reconciled, read-only view each widget renders from.
//!
//! One [`SnapshotStore`] exists per data domain (dashboard stats,
//! notifications, active connections). The polling scheduler, the push
//! channel and the optimistic coordinator all write through the store's
//! single mutation entry point, so no two writes interleave and listeners
//! always observe whole transitions.

mod entity;


pub use entity::{json_entity_id, EntityMap, Identified};

use crate::error::SyncError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, ThreadId};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// Nothing fetched yet
    #[default]
    Idle,
    /// A fetch is in flight
    Loading,
    /// Last fetch succeeded
    Ready,
    /// Last fetch failed; `value` still holds the last good data
    Error,
}

/// Versioned view of one data domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot<T> {
    pub value: Option<T>,
    pub last_updated_at: Option<DateTime<Utc>>,
    /// Incremented on every fetch initiation; never decreases
    pub generation: u64,
    pub status: SnapshotStatus,
    /// Detail of the last failed fetch, cleared on success
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<SyncError>,
    /// Entity ids with an outstanding optimistic mutation
    pub pending: BTreeSet<String>,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<SyncError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            value: None,
            last_updated_at: None,
            generation: 0,
            status: SnapshotStatus::Idle,
            error: None,
            pending: BTreeSet::new(),
        }
    }
}

impl<T> Snapshot<T> {
    pub fn is_ready(&self) -> bool {
        self.status == SnapshotStatus::Ready
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }
}

/// Outcome of settling a fetch against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchApplied {
    /// Value replaced, status Ready
    Ready,
    /// Status set to Error, previous value kept
    Failed,
    /// A newer fetch started since; response dropped
    Stale,
    /// The owning subscription was cancelled; response dropped
    Cancelled,
}

/// Token returned by [`SnapshotStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener<T> = Arc<dyn Fn(&Snapshot<T>) + Send + Sync>;

/// Re-applies one pending optimistic entity on top of a freshly fetched value.
type Overlay<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// Sole mutation authority for one data domain.
///
/// Listeners run synchronously on the writing thread after each transition
/// and receive the new snapshot. They may call [`current`](Self::current),
/// cancel subscriptions or detach channels feeding this store, but must not
/// write back into it.
pub struct SnapshotStore<T> {
    domain: String,
    /// Serializes writers and their listener notifications
    write_lock: Mutex<()>,
    /// Thread currently holding `write_lock`
    writer: Mutex<Option<ThreadId>>,
    /// Optimistic entities keyed by id, only touched under `write_lock`
    overlays: Mutex<BTreeMap<String, Overlay<T>>>,
    state: RwLock<Snapshot<T>>,
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
    next_listener: AtomicU64,
    watch_tx: watch::Sender<Snapshot<T>>,
}

fn lock<G>(m: &Mutex<G>) -> MutexGuard<'_, G> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records the owning thread for the lifetime of a write.
struct WriterMark<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> WriterMark<'a> {
    fn set(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *lock(slot) = Some(thread::current().id());
        Self(slot)
    }
}

impl Drop for WriterMark<'_> {
    fn drop(&mut self) {
        *lock(self.0) = None;
    }
}

impl<T> SnapshotStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty store (status Idle) for `domain`.
    pub fn new(domain: impl Into<String>) -> Self {
        let (watch_tx, _) = watch::channel(Snapshot::default());
        Self {
            domain: domain.into(),
            write_lock: Mutex::new(()),
            writer: Mutex::new(None),
            overlays: Mutex::new(BTreeMap::new()),
            state: RwLock::new(Snapshot::default()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            watch_tx,
        }
    }

    /// Name of the data domain, used in logs and metrics.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Clone of the current snapshot.
    pub fn current(&self) -> Snapshot<T> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current value only.
    pub fn value(&self) -> Option<T> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .value
            .clone()
    }

    pub fn generation(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Register a listener invoked after every state transition.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Snapshot<T>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was already removed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Watch channel for async consumers; sees the same transitions as
    /// listeners.
    pub fn watch(&self) -> watch::Receiver<Snapshot<T>> {
        self.watch_tx.subscribe()
    }

    /// Block until any write in progress has finished. After a writer's
    /// cancellation token is cancelled and `fence` returns, that writer can
    /// no longer change the store.
    ///
    /// Called from a listener (the writing thread already holds the lock),
    /// this returns at once: the writer re-checks its token under the lock
    /// before any later write.
    pub fn fence(&self) {
        if *lock(&self.writer) == Some(thread::current().id()) {
            return;
        }
        drop(lock(&self.write_lock));
    }

    /// Single mutation entry point. `f` returns `None` to signal "no
    /// transition", in which case listeners are not notified.
    pub(crate) fn transition<R>(&self, f: impl FnOnce(&mut Snapshot<T>) -> Option<R>) -> Option<R> {
        let _writer = lock(&self.write_lock);
        let _owner = WriterMark::set(&self.writer);
        let (result, snapshot) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let result = f(&mut *state)?;
            (result, (*state).clone())
        };

        let listeners: Vec<Listener<T>> = lock(&self.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
        self.watch_tx.send_replace(snapshot);

        Some(result)
    }

    /// Start a fetch: bump the generation and mark the snapshot Loading.
    /// Returns the generation the response must carry to be applied.
    pub fn begin_fetch(&self) -> u64 {
        self.transition(|s| {
            s.generation += 1;
            s.status = SnapshotStatus::Loading;
            Some(s.generation)
        })
        .unwrap_or_default()
    }

    /// [`begin_fetch`](Self::begin_fetch) unless `cancel` has fired, checked
    /// under the write lock.
    pub fn try_begin_fetch(&self, cancel: &CancellationToken) -> Option<u64> {
        self.transition(|s| {
            if cancel.is_cancelled() {
                return None;
            }
            s.generation += 1;
            s.status = SnapshotStatus::Loading;
            Some(s.generation)
        })
    }

    /// Settle a fetch with a ready result. See [`settle_fetch`](Self::settle_fetch).
    pub fn complete_fetch(&self, generation: u64, result: Result<T, SyncError>) -> FetchApplied {
        self.settle_fetch(generation, None, move |_| result)
    }

    /// Settle a fetch started with [`begin_fetch`](Self::begin_fetch).
    ///
    /// `merge` receives the current value and produces the new one; it only
    /// runs if `generation` is still current and `cancel` (when given) has
    /// not fired. Both checks happen under the write lock.
    pub fn settle_fetch<F>(
        &self,
        generation: u64,
        cancel: Option<&CancellationToken>,
        merge: F,
    ) -> FetchApplied
    where
        F: FnOnce(Option<&T>) -> Result<T, SyncError>,
    {
        let mut dropped = None;
        let applied = self.transition(|s| {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                dropped = Some(FetchApplied::Cancelled);
                return None;
            }
            if s.generation != generation {
                dropped = Some(FetchApplied::Stale);
                return None;
            }
            match merge(s.value.as_ref()) {
                Ok(mut value) => {
                    self.reapply_overlays(&s.pending, &mut value);
                    s.value = Some(value);
                    s.status = SnapshotStatus::Ready;
                    s.error = None;
                    s.last_updated_at = Some(Utc::now());
                    Some(FetchApplied::Ready)
                }
                Err(error) => {
                    s.status = SnapshotStatus::Error;
                    s.error = Some(error);
                    Some(FetchApplied::Failed)
                }
            }
        });

        match applied.or(dropped) {
            Some(FetchApplied::Stale) => {
                tracing::debug!(
                    domain = %self.domain,
                    generation,
                    current = self.generation(),
                    "Dropping stale response"
                );
                metrics::counter!("fleetsync_stale_dropped_total", "domain" => self.domain.clone())
                    .increment(1);
                FetchApplied::Stale
            }
            Some(outcome) => outcome,
            None => FetchApplied::Cancelled,
        }
    }

    /// Keep pending optimistic entities visible over a replaced value.
    fn reapply_overlays(&self, pending: &BTreeSet<String>, value: &mut T) {
        let overlays = lock(&self.overlays);
        for id in pending {
            if let Some(overlay) = overlays.get(id) {
                overlay(value);
            }
        }
    }

    /// Apply an out-of-band change to the value without touching the
    /// generation. `f` returns `Ok(true)` when it changed something.
    ///
    /// Returns `Err(Cancelled)` without running `f` if `cancel` has fired.
    pub fn apply_push<F>(&self, cancel: Option<&CancellationToken>, f: F) -> Result<bool, SyncError>
    where
        F: FnOnce(&mut Option<T>) -> Result<bool, SyncError>,
    {
        let mut outcome = Ok(false);
        self.transition(|s| {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                outcome = Err(SyncError::Cancelled);
                return None;
            }
            match f(&mut s.value) {
                Ok(true) => {
                    s.last_updated_at = Some(Utc::now());
                    outcome = Ok(true);
                    Some(())
                }
                Ok(false) => None,
                Err(e) => {
                    outcome = Err(e);
                    None
                }
            }
        });
        outcome
    }

    /// Replace the value outright (e.g. seeding from a one-shot fetch).
    /// The generation is left untouched.
    pub fn set_value(&self, mut value: T) {
        self.transition(|s| {
            self.reapply_overlays(&s.pending, &mut value);
            s.value = Some(value);
            s.status = SnapshotStatus::Ready;
            s.error = None;
            s.last_updated_at = Some(Utc::now());
            Some(())
        });
    }
}

impl<T> SnapshotStore<T>
where
    T: EntityMap + Clone + Send + Sync + 'static,
{
    /// Read one entity out of the current value.
    pub fn entity(&self, id: &str) -> Option<T::Entity> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .value
            .as_ref()
            .and_then(|v| v.get_entity(id))
    }

    /// Write one entity and update its pending marker. Returns the entity
    /// value it replaced. Fails if the snapshot holds no value yet.
    pub(crate) fn write_entity(
        &self,
        id: &str,
        entity: Option<T::Entity>,
        pending: bool,
    ) -> Result<Option<T::Entity>, SyncError> {
        let mut missing = false;
        let previous = self.transition(|s| {
            let Some(value) = s.value.as_mut() else {
                missing = true;
                return None;
            };
            let previous = value.get_entity(id);
            if pending {
                let overlay_id = id.to_string();
                let overlay_entity = entity.clone();
                lock(&self.overlays).insert(
                    id.to_string(),
                    Box::new(move |v: &mut T| v.put_entity(&overlay_id, overlay_entity.clone())),
                );
                s.pending.insert(id.to_string());
            } else {
                lock(&self.overlays).remove(id);
                s.pending.remove(id);
            }
            value.put_entity(id, entity);
            s.last_updated_at = Some(Utc::now());
            Some(previous)
        });
        match previous {
            Some(prev) => Ok(prev),
            None if missing => Err(SyncError::EntityNotFound(id.to_string())),
            None => Ok(None),
        }
    }

    /// Clear the pending marker without touching the entity.
    pub(crate) fn clear_pending(&self, id: &str) {
        self.transition(|s| {
            lock(&self.overlays).remove(id);
            s.pending.remove(id).then_some(())
        });
    }
}
