//! Type nodes: records of lazily created member nodes

use crate::cache::eviction::{settle, Eviction};
use crate::cache::registry::{Aliased, Binding, SharedStorage};
use crate::cache::types::Entry;
use crate::cache::{locked, shape_mismatch, CacheNode, Context};
use crate::error::Result;
use crate::schema::{encode_variables, Path, SchemaNode};
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Child slot of one member
enum Member {
    /// Member without declared variables
    Direct(Arc<CacheNode>),
    /// Member with declared variables, keyed by their encoding
    Keyed(HashMap<String, Arc<CacheNode>>),
}

/// Member nodes of a record; shared between paths that alias one entity
#[derive(Default)]
pub(crate) struct RecordStorage {
    members: Mutex<HashMap<String, Member>>,
}

impl RecordStorage {
    /// Child for `key` under the current variables, created on first touch
    fn child(
        &self,
        key: &str,
        schema: &SchemaNode,
        path: &Path,
        variables: &Value,
        ctx: &Arc<Context>,
    ) -> Arc<CacheNode> {
        let mut members = locked(&self.members);
        if schema.variables().is_empty() {
            let member = members
                .entry(key.to_string())
                .or_insert_with(|| Member::Direct(CacheNode::build(schema, path.key(key), ctx)));
            return match member {
                Member::Direct(node) => Arc::clone(node),
                Member::Keyed(nodes) => Arc::clone(
                    nodes
                        .entry(String::new())
                        .or_insert_with(|| CacheNode::build(schema, path.key(key), ctx)),
                ),
            };
        }

        let encoded = encode_variables(schema.variables(), variables);
        let member = members
            .entry(key.to_string())
            .or_insert_with(|| Member::Keyed(HashMap::new()));
        match member {
            Member::Keyed(nodes) => Arc::clone(
                nodes
                    .entry(encoded.clone())
                    .or_insert_with(|| CacheNode::build(schema, path.key(key).key(encoded), ctx)),
            ),
            Member::Direct(node) => Arc::clone(node),
        }
    }

    /// Child for `key` if it was ever written
    fn existing(
        &self,
        key: &str,
        schema: &SchemaNode,
        variables: &Value,
    ) -> Option<Arc<CacheNode>> {
        let members = locked(&self.members);
        match members.get(key)? {
            Member::Direct(node) => Some(Arc::clone(node)),
            Member::Keyed(nodes) => {
                let encoded = if schema.variables().is_empty() {
                    String::new()
                } else {
                    encode_variables(schema.variables(), variables)
                };
                nodes.get(&encoded).cloned()
            }
        }
    }
}

impl Aliased for RecordStorage {
    fn share(this: &Arc<Self>) -> SharedStorage {
        SharedStorage::Record(Arc::clone(this))
    }

    fn from_shared(shared: &SharedStorage) -> Option<Arc<Self>> {
        match shared {
            SharedStorage::Record(storage) => Some(Arc::clone(storage)),
            SharedStorage::Map(_) => None,
        }
    }

    fn merge_into(&self, target: &Self) {
        let mut source = locked(&self.members);
        let mut target = locked(&target.members);
        for (key, member) in source.drain() {
            match (target.get_mut(&key), member) {
                (None, member) => {
                    target.insert(key, member);
                }
                (Some(Member::Keyed(existing)), Member::Keyed(nodes)) => {
                    for (encoded, node) in nodes {
                        existing.entry(encoded).or_insert(node);
                    }
                }
                _ => {}
            }
        }
    }
}

pub(crate) struct RecordNode {
    schema: SchemaNode,
    path: Path,
    ctx: Arc<Context>,
    binding: Binding<RecordStorage>,
}

impl RecordNode {
    pub(crate) fn new(schema: SchemaNode, path: Path, ctx: Arc<Context>) -> Self {
        Self {
            schema,
            path,
            ctx,
            binding: Binding::new(RecordStorage::default()),
        }
    }

    fn storage(&self, variables: &Value, data: Option<&Value>) -> Arc<RecordStorage> {
        self.binding
            .resolve(&self.schema, &self.path, &self.ctx.registry, variables, data)
    }

    fn member_schema(&self, key: &str) -> Option<&SchemaNode> {
        self.schema.members().and_then(|members| members.get(key))
    }

    /// Write every member present in `data`; members it leaves out are untouched
    pub(crate) async fn write(&self, variables: &Value, data: Value) -> Result<Eviction> {
        if !data.is_object() {
            return Err(shape_mismatch(&self.path, "Type", &data));
        }
        let storage = self.storage(variables, Some(&data));
        let Value::Object(fields) = data else {
            return Ok(Eviction::noop());
        };

        let mut writes = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            if key == "__typename" {
                continue;
            }
            let Some(schema) = self.member_schema(&key) else {
                debug!("Skipping unknown member {} at {}", key, self.path);
                continue;
            };
            let node = storage.child(&key, schema, &self.path, variables, &self.ctx);
            writes.push(async move { node.write(variables, value).await });
        }

        settle(join_all(writes).await)
    }

    /// Present only if every member selected by `request` is present
    pub(crate) fn read(&self, request: &SchemaNode, variables: &Value) -> Option<Value> {
        let storage = self.storage(variables, None);
        let selection = request.members()?;

        let mut object = Map::new();
        for (key, selected) in selection {
            let schema = self.member_schema(key)?;
            let node = storage.existing(key, schema, variables)?;
            object.insert(key.clone(), node.read(selected, variables)?);
        }
        Some(Value::Object(object))
    }

    pub(crate) fn to_entries(&self, request: &SchemaNode, variables: &Value) -> Entry {
        let storage = self.storage(variables, None);
        let Some(selection) = request.members() else {
            return Entry::Absent;
        };

        let members: BTreeMap<String, Entry> = selection
            .iter()
            .map(|(key, selected)| {
                let entry = self
                    .member_schema(key)
                    .and_then(|schema| storage.existing(key, schema, variables))
                    .map_or(Entry::Absent, |node| node.to_entries(selected, variables));
                (key.clone(), entry)
            })
            .collect();
        Entry::Record(members)
    }
}
