//! Optimistic mutation coordinator.
//!
//! Writes a local change into the store immediately, runs the remote call
//! concurrently, and then either keeps the change (optionally replaced by the
//! server's echo) or restores the previous entity value. Each target entity
//! has at most one outstanding mutation; a second one is rejected with
//! [`SyncError::MutationPending`] until the first settles.


use crate::error::SyncError;
use crate::gateway::{ApiRequest, FetchGateway};
use crate::snapshot::{EntityMap, SnapshotStore};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Lifecycle of a pending mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Pending,
    Confirmed,
    RolledBack,
}

/// Bookkeeping for one in-flight optimistic change.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation<E> {
    pub id: Uuid,
    pub target_id: String,
    /// Entity value before the change (`None` if it did not exist)
    pub previous_value: Option<E>,
    /// Entity value written optimistically (`None` for a removal)
    pub optimistic_value: Option<E>,
    pub state: MutationState,
    pub started_at: DateTime<Utc>,
}

/// How a mutation settled.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<E> {
    /// Server accepted; `value` is what the store now holds for the entity
    Confirmed { value: Option<E> },
    /// Server rejected; the entity was restored to its previous value
    RolledBack { error: SyncError },
}

impl<E> MutationOutcome<E> {
    pub fn state(&self) -> MutationState {
        match self {
            MutationOutcome::Confirmed { .. } => MutationState::Confirmed,
            MutationOutcome::RolledBack { .. } => MutationState::RolledBack,
        }
    }

    /// Convert into a result, surfacing the rollback error.
    pub fn into_result(self) -> Result<Option<E>, SyncError> {
        match self {
            MutationOutcome::Confirmed { value } => Ok(value),
            MutationOutcome::RolledBack { error } => Err(error),
        }
    }
}

/// Returned synchronously by [`OptimisticCoordinator::apply_optimistic`].
pub struct MutationHandle<E> {
    pub id: Uuid,
    pub target_id: String,
    handle: JoinHandle<MutationOutcome<E>>,
}

impl<E> MutationHandle<E> {
    /// Wait for reconciliation.
    pub async fn outcome(self) -> MutationOutcome<E> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => MutationOutcome::RolledBack {
                error: SyncError::Network(format!("mutation task failed: {}", e)),
            },
        }
    }

    pub fn is_settled(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Applies optimistic entity changes to one store.
pub struct OptimisticCoordinator<T: EntityMap> {
    store: Arc<SnapshotStore<T>>,
    pending: Arc<DashMap<String, PendingMutation<T::Entity>>>,
}

impl<T> OptimisticCoordinator<T>
where
    T: EntityMap + Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<SnapshotStore<T>>) -> Self {
        Self {
            store,
            pending: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore<T>> {
        &self.store
    }

    /// Write `new_value` for `target_id` now and reconcile once `remote`
    /// settles.
    ///
    /// `remote` resolves to the server's echo of the entity (`Some`) or to
    /// `None` when the server returns no representation; on error the entity
    /// is restored to exactly its previous value.
    pub fn apply_optimistic<Fut>(
        &self,
        target_id: &str,
        new_value: Option<T::Entity>,
        remote: Fut,
    ) -> Result<MutationHandle<T::Entity>, SyncError>
    where
        Fut: Future<Output = Result<Option<T::Entity>, SyncError>> + Send + 'static,
    {
        let id = Uuid::new_v4();

        match self.pending.entry(target_id.to_string()) {
            Entry::Occupied(_) => {
                tracing::debug!(target_id, "Rejecting overlapping mutation");
                return Err(SyncError::MutationPending(target_id.to_string()));
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingMutation {
                    id,
                    target_id: target_id.to_string(),
                    previous_value: None,
                    optimistic_value: new_value.clone(),
                    state: MutationState::Pending,
                    started_at: Utc::now(),
                });
            }
        }

        let previous = match self.store.write_entity(target_id, new_value, true) {
            Ok(previous) => previous,
            Err(e) => {
                self.pending.remove(target_id);
                return Err(e);
            }
        };
        if let Some(mut entry) = self.pending.get_mut(target_id) {
            entry.previous_value = previous.clone();
        }

        tracing::debug!(target_id, mutation_id = %id, "Optimistic change applied");

        let store = Arc::clone(&self.store);
        let pending = Arc::clone(&self.pending);
        let target = target_id.to_string();
        let handle = tokio::spawn(async move {
            let result = remote.await;
            settle(&store, &pending, &target, id, previous, result)
        });

        Ok(MutationHandle {
            id,
            target_id: target_id.to_string(),
            handle,
        })
    }

    /// Apply optimistically and confirm through a gateway call. A JSON
    /// object in the response body is taken as the server's echo.
    pub fn apply_request(
        &self,
        target_id: &str,
        new_value: Option<T::Entity>,
        gateway: Arc<dyn FetchGateway>,
        request: ApiRequest,
    ) -> Result<MutationHandle<T::Entity>, SyncError>
    where
        T::Entity: DeserializeOwned,
    {
        self.apply_optimistic(target_id, new_value, async move {
            let response = gateway.send(request).await?;
            match response.data {
                Value::Object(_) => response.json().map(Some),
                _ => Ok(None),
            }
        })
    }

    /// Snapshot of the outstanding mutation for `target_id`, if any.
    pub fn pending(&self, target_id: &str) -> Option<PendingMutation<T::Entity>> {
        self.pending.get(target_id).map(|m| m.value().clone())
    }

    pub fn is_pending(&self, target_id: &str) -> bool {
        self.pending.contains_key(target_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

fn settle<T>(
    store: &SnapshotStore<T>,
    pending: &DashMap<String, PendingMutation<T::Entity>>,
    target_id: &str,
    id: Uuid,
    previous: Option<T::Entity>,
    result: Result<Option<T::Entity>, SyncError>,
) -> MutationOutcome<T::Entity>
where
    T: EntityMap + Clone + Send + Sync + 'static,
{
    let outcome = match result {
        Ok(echo) => {
            let value = match echo {
                Some(server_value) => {
                    let _ = store.write_entity(target_id, Some(server_value.clone()), false);
                    Some(server_value)
                }
                None => {
                    store.clear_pending(target_id);
                    store.entity(target_id)
                }
            };
            tracing::debug!(target_id, mutation_id = %id, "Mutation confirmed");
            MutationOutcome::Confirmed { value }
        }
        Err(error) => {
            let _ = store.write_entity(target_id, previous, false);
            tracing::warn!(
                target_id,
                mutation_id = %id,
                error = %error,
                "Mutation rejected, rolled back"
            );
            MutationOutcome::RolledBack { error }
        }
    };

    pending.remove(target_id);

    let label = match outcome.state() {
        MutationState::Confirmed => "confirmed",
        _ => "rolled_back",
    };
    metrics::counter!("fleetsync_mutation_total", "outcome" => label).increment(1);

    outcome
}
