//! Entity-level access into a snapshot value.
//!
//! Optimistic mutations target one entity inside a collection-shaped value
//! (the user list, tunnel cards). [`EntityMap`] is how the coordinator reads
//! and replaces that entity without knowing the collection's shape.

use serde_json::Value;
use std::collections::BTreeMap;

/// A collection whose members can be addressed by string id.
pub trait EntityMap {
    type Entity: Clone + PartialEq + Send + Sync + 'static;

    fn get_entity(&self, id: &str) -> Option<Self::Entity>;

    /// Replace the entity with `id`, insert it if absent, or remove it when
    /// `entity` is `None`.
    fn put_entity(&mut self, id: &str, entity: Option<Self::Entity>);
}

/// Types that carry their own identifier.
pub trait Identified {
    fn entity_id(&self) -> String;
}

impl<E> EntityMap for BTreeMap<String, E>
where
    E: Clone + PartialEq + Send + Sync + 'static,
{
    type Entity = E;

    fn get_entity(&self, id: &str) -> Option<E> {
        self.get(id).cloned()
    }

    fn put_entity(&mut self, id: &str, entity: Option<E>) {
        match entity {
            Some(e) => {
                self.insert(id.to_string(), e);
            }
            None => {
                self.remove(id);
            }
        }
    }
}

impl<E> EntityMap for Vec<E>
where
    E: Identified + Clone + PartialEq + Send + Sync + 'static,
{
    type Entity = E;

    fn get_entity(&self, id: &str) -> Option<E> {
        self.iter().find(|e| e.entity_id() == id).cloned()
    }

    fn put_entity(&mut self, id: &str, entity: Option<E>) {
        let pos = self.iter().position(|e| e.entity_id() == id);
        match (pos, entity) {
            (Some(i), Some(e)) => self[i] = e,
            (Some(i), None) => {
                self.remove(i);
            }
            (None, Some(e)) => self.push(e),
            (None, None) => {}
        }
    }
}

/// Id of a JSON entity: its `id` field as a string, numbers included.
pub fn json_entity_id(entity: &Value) -> Option<String> {
    match entity.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Identified for Value {
    fn entity_id(&self) -> String {
        json_entity_id(self).unwrap_or_default()
    }
}

/// JSON arrays are addressed by each element's `id`; JSON objects by key.
impl EntityMap for Value {
    type Entity = Value;

    fn get_entity(&self, id: &str) -> Option<Value> {
        match self {
            Value::Array(items) => items
                .iter()
                .find(|e| json_entity_id(e).as_deref() == Some(id))
                .cloned(),
            Value::Object(map) => map.get(id).cloned(),
            _ => None,
        }
    }

    fn put_entity(&mut self, id: &str, entity: Option<Value>) {
        match self {
            Value::Array(items) => items.put_entity(id, entity),
            Value::Object(map) => match entity {
                Some(e) => {
                    map.insert(id.to_string(), e);
                }
                None => {
                    map.remove(id);
                }
            },
            _ => {}
        }
    }
}
