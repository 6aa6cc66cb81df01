//! Merge functions keyed by push event type.

use crate::error::SyncError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Folds one event payload into the snapshot value. Returns `Ok(true)` when
/// the value changed.
pub type MergeFn<T> = Arc<dyn Fn(&mut Option<T>, &Value) -> Result<bool, SyncError> + Send + Sync>;

/// Shallow-merge `patch` into `target`: top-level keys of `patch` overwrite
/// those of `target`. A non-object target is replaced by an object patch.
/// Returns true when `target` changed.
pub fn shallow_merge(target: &mut Value, patch: &Value) -> bool {
    let Value::Object(patch_map) = patch else {
        return false;
    };
    match target {
        Value::Object(target_map) => {
            let mut changed = false;
            for (key, value) in patch_map {
                if target_map.get(key) != Some(value) {
                    target_map.insert(key.clone(), value.clone());
                    changed = true;
                }
            }
            changed
        }
        other => {
            *other = patch.clone();
            true
        }
    }
}

/// Registered merge functions, one per event type.
pub struct MergeRegistry<T> {
    handlers: HashMap<String, MergeFn<T>>,
}

impl<T> MergeRegistry<T> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `merge` for events whose `type` equals `event_type`.
    pub fn on<F>(mut self, event_type: impl Into<String>, merge: F) -> Self
    where
        F: Fn(&mut Option<T>, &Value) -> Result<bool, SyncError> + Send + Sync + 'static,
    {
        self.handlers.insert(event_type.into(), Arc::new(merge));
        self
    }

    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    pub fn get(&self, event_type: &str) -> Option<MergeFn<T>> {
        self.handlers.get(event_type).cloned()
    }

    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl MergeRegistry<Value> {
    /// Register a shallow merge of the event's `data` into the snapshot.
    /// An empty snapshot is seeded with the payload.
    pub fn on_shallow_merge(self, event_type: impl Into<String>) -> Self {
        self.on(event_type, |value: &mut Option<Value>, data: &Value| {
            Ok(match value {
                Some(current) => shallow_merge(current, data),
                None => {
                    *value = Some(data.clone());
                    true
                }
            })
        })
    }
}

impl<T> Default for MergeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
