//! Unique-entity registry
//!
//! Nodes with a custom identity hook resolve an id at runtime. Every node that
//! resolves the same id shares one storage, so writes made through one schema
//! path are observed through every other path with that identity. Entries
//! live as long as the cache that owns the registry.

use crate::cache::locked;
use crate::cache::map::MapStorage;
use crate::cache::record::RecordStorage;
use crate::schema::{Path, SchemaNode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Storage that can be registered under an identity
#[derive(Clone)]
pub(crate) enum SharedStorage {
    Record(Arc<RecordStorage>),
    Map(Arc<MapStorage>),
}

/// Storage kinds that support identity aliasing
pub(crate) trait Aliased: Send + Sync + Sized + 'static {
    fn share(this: &Arc<Self>) -> SharedStorage;

    fn from_shared(shared: &SharedStorage) -> Option<Arc<Self>>;

    /// Move the entries `target` lacks into `target`
    fn merge_into(&self, target: &Self);
}

/// Identity -> shared storage, scoped to one cache
#[derive(Default)]
pub(crate) struct EntityRegistry {
    entries: Mutex<HashMap<String, SharedStorage>>,
}

impl EntityRegistry {
    /// Return the storage registered under `id`, registering `candidate` if there is none
    pub(crate) fn resolve(&self, id: &str, candidate: SharedStorage) -> SharedStorage {
        let mut entries = locked(&self.entries);
        entries.entry(id.to_string()).or_insert(candidate).clone()
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        locked(&self.entries).contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        locked(&self.entries).len()
    }
}

struct BindingState<S> {
    storage: Arc<S>,
    id: Option<String>,
}

/// A node's current storage and the identity it resolved to, if any
pub(crate) struct Binding<S> {
    state: Mutex<BindingState<S>>,
}

impl<S: Aliased> Binding<S> {
    pub(crate) fn new(storage: S) -> Self {
        Self {
            state: Mutex::new(BindingState {
                storage: Arc::new(storage),
                id: None,
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn id(&self) -> Option<String> {
        locked(&self.state).id.clone()
    }

    /// Current storage, resolving the node's identity first while it is unresolved
    pub(crate) fn resolve(
        &self,
        schema: &SchemaNode,
        path: &Path,
        registry: &EntityRegistry,
        variables: &Value,
        data: Option<&Value>,
    ) -> Arc<S> {
        let mut state = locked(&self.state);
        if state.id.is_some() {
            return Arc::clone(&state.storage);
        }
        let Some(to_id) = schema.cache_id() else {
            return Arc::clone(&state.storage);
        };
        let Some(id) = to_id(path, variables, data).filter(|id| !id.is_empty()) else {
            return Arc::clone(&state.storage);
        };

        let shared = registry.resolve(&id, S::share(&state.storage));
        match S::from_shared(&shared) {
            Some(target) => {
                if Arc::ptr_eq(&target, &state.storage) {
                    debug!("Registered entity {} at {}", id, path);
                } else {
                    debug!("Aliasing {} to entity {}", path, id);
                    state.storage.merge_into(&target);
                    state.storage = target;
                }
                state.id = Some(id);
            }
            None => {
                warn!(
                    "Entity {} is registered with a different node kind, {} keeps its own storage",
                    id, path
                );
            }
        }

        Arc::clone(&state.storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed_schema() -> SchemaNode {
        SchemaNode::map(SchemaNode::string(), SchemaNode::int()).with_cache_id(|_, _, data| {
            data.and_then(|d| d.get("id"))
                .and_then(Value::as_str)
                .map(|id| format!("Counter:{}", id))
        })
    }

    #[test]
    fn test_registry_first_candidate_wins() {
        let registry = EntityRegistry::default();
        let a = Arc::new(MapStorage::default());
        let b = Arc::new(MapStorage::default());

        let first = registry.resolve("x", SharedStorage::Map(Arc::clone(&a)));
        let second = registry.resolve("x", SharedStorage::Map(Arc::clone(&b)));

        assert!(matches!(first, SharedStorage::Map(s) if Arc::ptr_eq(&s, &a)));
        assert!(matches!(second, SharedStorage::Map(s) if Arc::ptr_eq(&s, &a)));
        assert!(registry.contains("x"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_binding_waits_for_an_id() {
        let registry = EntityRegistry::default();
        let schema = keyed_schema();
        let path = Path::root("root");
        let binding: Binding<MapStorage> = Binding::new(MapStorage::default());

        binding.resolve(&schema, &path, &registry, &Value::Null, None);
        assert_eq!(binding.id(), None);
        assert_eq!(registry.len(), 0);

        let data = serde_json::json!({"id": "7"});
        binding.resolve(&schema, &path, &registry, &Value::Null, Some(&data));
        assert_eq!(binding.id(), Some("Counter:7".to_string()));
        assert!(registry.contains("Counter:7"));
    }

    #[test]
    fn test_bindings_with_same_id_share_storage() {
        let registry = EntityRegistry::default();
        let schema = keyed_schema();
        let data = serde_json::json!({"id": "1"});
        let left: Binding<MapStorage> = Binding::new(MapStorage::default());
        let right: Binding<MapStorage> = Binding::new(MapStorage::default());

        let a = left.resolve(&schema, &Path::root("a"), &registry, &Value::Null, Some(&data));
        let b = right.resolve(&schema, &Path::root("b"), &registry, &Value::Null, Some(&data));

        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_kind_conflict_keeps_local_storage() {
        let registry = EntityRegistry::default();
        registry.resolve("Counter:1", SharedStorage::Record(Arc::new(RecordStorage::default())));

        let schema = keyed_schema();
        let data = serde_json::json!({"id": "1"});
        let binding: Binding<MapStorage> = Binding::new(MapStorage::default());
        binding.resolve(&schema, &Path::root("root"), &registry, &Value::Null, Some(&data));

        assert_eq!(binding.id(), None);
    }
}
