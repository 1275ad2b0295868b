//! Sum nodes: one current member chosen by `__typename`

use crate::cache::eviction::Eviction;
use crate::cache::slot::{Revision, Slot};
use crate::cache::types::Entry;
use crate::cache::{shape_mismatch, CacheNode, Context};
use crate::error::{CacheError, Result};
use crate::schema::{Path, SchemaNode};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const TYPENAME: &str = "__typename";

#[derive(Clone)]
struct Variant {
    typename: String,
    node: Arc<CacheNode>,
}

pub(crate) struct SumNode {
    schema: SchemaNode,
    path: Path,
    ctx: Arc<Context>,
    current: Arc<Slot<Option<Variant>>>,
    revision: Arc<Revision>,
}

impl SumNode {
    pub(crate) fn new(schema: SchemaNode, path: Path, ctx: Arc<Context>) -> Self {
        Self {
            schema,
            path,
            ctx,
            current: Arc::new(Slot::new(None)),
            revision: Arc::new(Revision::new()),
        }
    }

    /// Install a fresh member; the eviction puts the previous one back while this one is current
    fn install(&self, variant: Variant) -> Eviction {
        let (previous, stamp) = self.current.replace(Some(variant));
        self.revision.bump();

        let (current, revision) = (Arc::clone(&self.current), Arc::clone(&self.revision));
        Eviction::new(move || {
            if current.restore(stamp, previous.clone()) {
                revision.bump();
            }
        })
    }

    /// Same typename merges into the current member, a new one replaces it
    pub(crate) async fn write(&self, variables: &Value, data: Value) -> Result<Eviction> {
        let typename = match &data {
            Value::Object(fields) => fields
                .get(TYPENAME)
                .and_then(Value::as_str)
                .map(str::to_string),
            other => return Err(shape_mismatch(&self.path, "Sum", other)),
        };

        let current = self.current.get();
        let typename = match (typename, current) {
            (None, Some(variant)) => return variant.node.write(variables, data).await,
            (Some(typename), Some(variant)) if variant.typename == typename => {
                return variant.node.write(variables, data).await;
            }
            (None, None) => {
                return Err(CacheError::MissingTypename {
                    path: self.path.to_string(),
                })
            }
            (Some(typename), _) => typename,
        };

        let member = self
            .schema
            .members()
            .and_then(|members| members.get(&typename))
            .ok_or_else(|| CacheError::UnknownSumMember {
                path: self.path.to_string(),
                typename: typename.clone(),
            })?;

        debug!("Switching {} to member {}", self.path, typename);
        let node = CacheNode::build(member, self.path.clone(), &self.ctx);
        node.write(variables, data).await?;
        Ok(self.install(Variant { typename, node }))
    }

    pub(crate) fn read(&self, request: &SchemaNode, variables: &Value) -> Option<Value> {
        let variant = self.current.get()?;
        let Some(selected) = selection(request, &variant.typename) else {
            return Some(typename_only(&variant.typename));
        };

        let mut value = variant.node.read(selected, variables)?;
        if let Value::Object(object) = &mut value {
            object.insert(TYPENAME.to_string(), Value::String(variant.typename.clone()));
        }
        Some(value)
    }

    pub(crate) fn to_entries(&self, request: &SchemaNode, variables: &Value) -> Entry {
        let Some(variant) = self.current.get() else {
            return Entry::Absent;
        };
        let entry = match selection(request, &variant.typename) {
            Some(selected) => variant.node.to_entries(selected, variables),
            None => Entry::Record(BTreeMap::new()),
        };
        Entry::Sum {
            typename: variant.typename,
            entry: Box::new(entry),
            changes: self.revision.subscribe(),
        }
    }
}

fn selection<'a>(request: &'a SchemaNode, typename: &str) -> Option<&'a SchemaNode> {
    request.members().and_then(|members| members.get(typename))
}

fn typename_only(typename: &str) -> Value {
    let mut object = Map::new();
    object.insert(TYPENAME.to_string(), Value::String(typename.to_string()));
    Value::Object(object)
}
