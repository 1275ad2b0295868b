//! Array and NonEmptyArray nodes

use crate::cache::eviction::{settle, Eviction};
use crate::cache::slot::{Revision, Slot};
use crate::cache::types::Entry;
use crate::cache::{locked, pace, shape_mismatch, CacheNode, Context};
use crate::error::Result;
use crate::schema::{Path, SchemaNode, Tag};
use futures::future::join_all;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::debug;

type Items = Arc<Mutex<Vec<Arc<CacheNode>>>>;

pub(crate) struct SequenceNode {
    item: SchemaNode,
    path: Path,
    ctx: Arc<Context>,
    non_empty: bool,
    written: Arc<Slot<bool>>,
    items: Items,
    revision: Arc<Revision>,
}

impl SequenceNode {
    pub(crate) fn new(
        item: SchemaNode,
        path: Path,
        ctx: Arc<Context>,
        non_empty: bool,
    ) -> Self {
        Self {
            item,
            path,
            ctx,
            non_empty,
            written: Arc::new(Slot::new(false)),
            items: Arc::new(Mutex::new(Vec::new())),
            revision: Arc::new(Revision::new()),
        }
    }

    fn tag(&self) -> Tag {
        if self.non_empty {
            Tag::NonEmptyArray
        } else {
            Tag::Array
        }
    }

    fn snapshot(&self) -> Vec<Arc<CacheNode>> {
        locked(&self.items).clone()
    }

    /// Append a fresh child; its eviction detaches it again
    fn append(&self) -> (Arc<CacheNode>, Eviction) {
        let node = {
            let mut items = locked(&self.items);
            let node = CacheNode::build(&self.item, self.path.index(items.len()), &self.ctx);
            items.push(Arc::clone(&node));
            node
        };
        self.revision.bump();

        let (items, revision, appended) = (
            Arc::clone(&self.items),
            Arc::clone(&self.revision),
            Arc::clone(&node),
        );
        let eviction = Eviction::new(move || {
            if detach(&items, &appended) {
                revision.bump();
            }
        });
        (node, eviction)
    }

    /// Remove `node`, which held `index` before this write; its eviction puts it back
    fn remove(&self, index: usize, node: Arc<CacheNode>) -> Eviction {
        if !detach(&self.items, &node) {
            return Eviction::noop();
        }
        self.revision.bump();

        let (items, revision) = (Arc::clone(&self.items), Arc::clone(&self.revision));
        Eviction::new(move || {
            if reinsert(&items, index, &node) {
                revision.bump();
            }
        })
    }

    /// Drop every child from `len` on; the eviction re-inserts the tail
    fn truncate(&self, len: usize) -> Eviction {
        let tail: Vec<Arc<CacheNode>> = {
            let mut items = locked(&self.items);
            if items.len() <= len {
                return Eviction::noop();
            }
            items.drain(len..).collect()
        };
        debug!("Truncated {} stale items at {}", tail.len(), self.path);
        self.revision.bump();

        let (items, revision) = (Arc::clone(&self.items), Arc::clone(&self.revision));
        Eviction::new(move || {
            let mut changed = false;
            for (offset, node) in tail.iter().enumerate() {
                changed |= reinsert(&items, len + offset, node);
            }
            if changed {
                revision.bump();
            }
        })
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

    /// Overlay `data` index by index.
    ///
    /// Indices address the items held before this write. Null entries are
    /// removed once every other index has been written, highest index first;
    /// a null past the held items removes nothing.
    pub(crate) async fn write(&self, variables: &Value, data: Value) -> Result<Eviction> {
        let values = match data {
            Value::Array(values) => values,
            other => return Err(shape_mismatch(&self.path, self.tag().as_str(), &other)),
        };

        let mut structural = vec![self.mark_written()];
        if self.ctx.config.use_immutable_arrays {
            structural.push(self.truncate(values.len()));
        }

        let held = self.snapshot();
        let mut removals = Vec::new();
        let mut writes = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            pace(index, self.ctx.config.yield_every).await;
            if value.is_null() {
                if let Some(node) = held.get(index) {
                    removals.push((index, Arc::clone(node)));
                }
                continue;
            }

            let node = match held.get(index).cloned() {
                Some(node) => node,
                None => {
                    let (node, eviction) = self.append();
                    structural.push(eviction);
                    node
                }
            };
            writes.push(async move { node.write(variables, value).await });
        }

        let mut results = join_all(writes).await;
        if results.iter().all(Result::is_ok) {
            results.extend(
                removals
                    .into_iter()
                    .rev()
                    .map(|(index, node)| Ok(self.remove(index, node))),
            );
        }
        results.extend(structural.into_iter().map(Ok));
        settle(results)
    }

    pub(crate) fn read(&self, request: &SchemaNode, variables: &Value) -> Option<Value> {
        if !self.written.get() {
            return None;
        }
        let request = request.item().unwrap_or(request);
        let values = self
            .snapshot()
            .iter()
            .map(|node| node.read(request, variables))
            .collect::<Option<Vec<Value>>>()?;

        if self.non_empty && values.is_empty() {
            return None;
        }
        Some(Value::Array(values))
    }

    pub(crate) fn to_entries(&self, request: &SchemaNode, variables: &Value) -> Entry {
        if !self.written.get() {
            return Entry::Absent;
        }
        let request = request.item().unwrap_or(request);
        let items: Vec<Entry> = self
            .snapshot()
            .iter()
            .map(|node| node.to_entries(request, variables))
            .collect();

        if self.non_empty && items.is_empty() {
            return Entry::Absent;
        }
        Entry::List {
            items,
            changes: self.revision.subscribe(),
        }
    }
}

fn detach(items: &Items, node: &Arc<CacheNode>) -> bool {
    let mut items = locked(items);
    match items.iter().position(|item| Arc::ptr_eq(item, node)) {
        Some(position) => {
            items.remove(position);
            true
        }
        None => false,
    }
}

fn reinsert(items: &Items, index: usize, node: &Arc<CacheNode>) -> bool {
    let mut items = locked(items);
    if items.iter().any(|item| Arc::ptr_eq(item, node)) {
        return false;
    }
    let index = index.min(items.len());
    items.insert(index, Arc::clone(node));
    true
}
