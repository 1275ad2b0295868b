//! Map nodes: string keys to lazily created children

use crate::cache::eviction::{settle, Eviction};
use crate::cache::registry::{Aliased, Binding, SharedStorage};
use crate::cache::slot::{Revision, Slot};
use crate::cache::types::Entry;
use crate::cache::{locked, pace, shape_mismatch, CacheNode, Context};
use crate::error::{CacheError, Result};
use crate::schema::{Path, SchemaNode};
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Children of a map; shared between paths that alias one entity
pub(crate) struct MapStorage {
    entries: Mutex<BTreeMap<String, Arc<CacheNode>>>,
    written: Arc<Slot<bool>>,
    revision: Revision,
}

impl Default for MapStorage {
    fn default() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            written: Arc::new(Slot::new(false)),
            revision: Revision::new(),
        }
    }
}

impl MapStorage {
    fn snapshot(&self) -> Vec<(String, Arc<CacheNode>)> {
        locked(&self.entries)
            .iter()
            .map(|(key, node)| (key.clone(), Arc::clone(node)))
            .collect()
    }

    /// Existing child for `key`, or a fresh one; the flag tells whether it was created
    fn get_or_insert(
        &self,
        key: &str,
        build: impl FnOnce() -> Arc<CacheNode>,
    ) -> (Arc<CacheNode>, bool) {
        let mut entries = locked(&self.entries);
        if let Some(node) = entries.get(key) {
            return (Arc::clone(node), false);
        }
        let node = build();
        entries.insert(key.to_string(), Arc::clone(&node));
        drop(entries);
        self.revision.bump();
        (node, true)
    }

    fn remove(&self, key: &str) -> Option<Arc<CacheNode>> {
        let removed = locked(&self.entries).remove(key);
        if removed.is_some() {
            self.revision.bump();
        }
        removed
    }

    fn restore_if_vacant(&self, key: &str, node: &Arc<CacheNode>) {
        let mut entries = locked(&self.entries);
        if entries.contains_key(key) {
            return;
        }
        entries.insert(key.to_string(), Arc::clone(node));
        drop(entries);
        self.revision.bump();
    }

    fn remove_if_same(&self, key: &str, node: &Arc<CacheNode>) {
        let mut entries = locked(&self.entries);
        if !entries.get(key).is_some_and(|held| Arc::ptr_eq(held, node)) {
            return;
        }
        entries.remove(key);
        drop(entries);
        self.revision.bump();
    }

    fn mark_written(&self) -> Eviction {
        if self.written.get() {
            return Eviction::noop();
        }
        let (previous, stamp) = self.written.replace(true);
        let written = Arc::clone(&self.written);
        Eviction::new(move || {
            written.restore(stamp, previous);
        })
    }
}

impl Aliased for MapStorage {
    fn share(this: &Arc<Self>) -> SharedStorage {
        SharedStorage::Map(Arc::clone(this))
    }

    fn from_shared(shared: &SharedStorage) -> Option<Arc<Self>> {
        match shared {
            SharedStorage::Map(storage) => Some(Arc::clone(storage)),
            SharedStorage::Record(_) => None,
        }
    }

    fn merge_into(&self, target: &Self) {
        let moved = {
            let mut source = locked(&self.entries);
            let mut entries = locked(&target.entries);
            let mut moved = false;
            for (key, node) in std::mem::take(&mut *source) {
                if !entries.contains_key(&key) {
                    entries.insert(key, node);
                    moved = true;
                }
            }
            moved
        };
        if self.written.get() && !target.written.get() {
            target.written.replace(true);
        }
        if moved {
            target.revision.bump();
        }
    }
}

pub(crate) struct MapNode {
    schema: SchemaNode,
    path: Path,
    ctx: Arc<Context>,
    binding: Binding<MapStorage>,
}

impl MapNode {
    pub(crate) fn new(schema: SchemaNode, path: Path, ctx: Arc<Context>) -> Self {
        Self {
            schema,
            path,
            ctx,
            binding: Binding::new(MapStorage::default()),
        }
    }

    fn storage(&self, variables: &Value, data: Option<&Value>) -> Arc<MapStorage> {
        self.binding
            .resolve(&self.schema, &self.path, &self.ctx.registry, variables, data)
    }

    /// Merge `data` key by key; a `null` value deletes the key
    pub(crate) async fn write(&self, variables: &Value, data: Value) -> Result<Eviction> {
        if !data.is_object() {
            return Err(shape_mismatch(&self.path, "Map", &data));
        }
        let item = self
            .schema
            .item()
            .ok_or_else(|| {
                CacheError::Other(format!("Map node at {} has no item schema", self.path))
            })?;
        let storage = self.storage(variables, Some(&data));
        let Value::Object(fields) = data else {
            return Ok(Eviction::noop());
        };

        let mut structural = vec![storage.mark_written()];
        let mut writes = Vec::with_capacity(fields.len());
        for (position, (key, value)) in fields.into_iter().enumerate() {
            pace(position, self.ctx.config.yield_every).await;

            if value.is_null() {
                if let Some(previous) = storage.remove(&key) {
                    let storage = Arc::clone(&storage);
                    structural.push(Eviction::new(move || {
                        storage.restore_if_vacant(&key, &previous)
                    }));
                }
                continue;
            }

            let (node, created) = storage.get_or_insert(&key, || {
                CacheNode::build(item, self.path.key(key.as_str()), &self.ctx)
            });
            if created {
                let (storage, key, node) = (Arc::clone(&storage), key.clone(), Arc::clone(&node));
                structural.push(Eviction::new(move || storage.remove_if_same(&key, &node)));
            }
            writes.push(async move { node.write(variables, value).await });
        }

        let mut results = join_all(writes).await;
        results.extend(structural.into_iter().map(Ok));
        settle(results)
    }

    /// Every held entry, or `None` if any of them is absent
    pub(crate) fn read(&self, request: &SchemaNode, variables: &Value) -> Option<Value> {
        let storage = self.storage(variables, None);
        if !storage.written.get() {
            return None;
        }
        let request = request.item().unwrap_or(request);

        let mut object = Map::new();
        for (key, node) in storage.snapshot() {
            object.insert(key, node.read(request, variables)?);
        }
        Some(Value::Object(object))
    }

    pub(crate) fn to_entries(&self, request: &SchemaNode, variables: &Value) -> Entry {
        let storage = self.storage(variables, None);
        if !storage.written.get() {
            return Entry::Absent;
        }
        let request = request.item().unwrap_or(request);

        let entries = storage
            .snapshot()
            .into_iter()
            .map(|(key, node)| (key, node.to_entries(request, variables)))
            .collect();
        Entry::Map {
            entries,
            changes: storage.revision.subscribe(),
        }
    }
}
