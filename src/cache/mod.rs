//! # Normalized Reactive Cache
//!
//! This module implements the cache engine: one runtime node per schema
//! position, each owning storage suited to its kind.
//!
//! ## Features
//!
//! - **Merge Writes**: records and maps accept partial data; absent keys stay untouched
//! - **Selection Reads**: reads follow the request tree and are all-or-nothing per selection
//! - **Evictions**: every write returns a handle that undoes exactly that write
//! - **Entity Aliasing**: nodes resolving the same custom id share one storage
//! - **Ordered Writes**: top-level writes apply strictly in submission order
//! - **Live Handles**: `to_entries` exposes `watch` receivers for reactive bindings
//!
//! ## Example
//!
//! ```rust
//! use ouroboros_cache::cache::{Cache, CacheConfig};
//! use ouroboros_cache::schema::SchemaNode;
//! use serde_json::json;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let schema = SchemaNode::object("Person", [
//!     ("name", SchemaNode::string()),
//!     ("age", SchemaNode::int()),
//! ]);
//!
//! let cache = Cache::new(schema.clone(), CacheConfig::default())?;
//! let session = cache.session(schema)?;
//!
//! let eviction = session.write(json!({}), json!({"name": "Harry", "age": 29})).await?;
//! assert_eq!(session.read(&json!({})), Some(json!({"name": "Harry", "age": 29})));
//!
//! eviction.evict();
//! assert_eq!(session.read(&json!({})), None);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod eviction;
pub mod persist;
pub mod store;
pub mod types;

mod leaf;
mod map;
mod option;
mod record;
mod registry;
mod sequence;
mod sequencer;
mod slot;
mod sum;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use eviction::Eviction;
pub use persist::Persist;
pub use store::{Cache, CacheSession};
pub use types::{CacheStats, Entry};

use crate::error::{CacheError, Result};
use crate::schema::{NodeKind, Path, SchemaNode};
use futures::future::{self, BoxFuture, FutureExt};
use leaf::LeafNode;
use map::MapNode;
use option::OptionNode;
use record::RecordNode;
use registry::EntityRegistry;
use sequence::SequenceNode;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sum::SumNode;

/// State shared by every node of one cache
pub(crate) struct Context {
    pub(crate) config: CacheConfig,
    pub(crate) registry: EntityRegistry,
}

impl Context {
    pub(crate) fn new(config: CacheConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: EntityRegistry::default(),
        })
    }
}

/// Runtime node, one per schema position and resolved identity
pub(crate) enum CacheNode {
    Leaf(LeafNode),
    Record(RecordNode),
    Sequence(SequenceNode),
    Map(MapNode),
    Sum(SumNode),
    Option(OptionNode),
}

impl CacheNode {
    /// Build the node for `schema`; nested nodes are created lazily on first touch
    pub(crate) fn build(schema: &SchemaNode, path: Path, ctx: &Arc<Context>) -> Arc<Self> {
        let schema = schema.unwrap_mutation();
        if schema.is_entity() {
            return Arc::new(CacheNode::Leaf(LeafNode::new(schema.tag(), path)));
        }

        let node = match schema.kind() {
            NodeKind::String
            | NodeKind::Int
            | NodeKind::Float
            | NodeKind::Boolean
            | NodeKind::Scalar { .. } => CacheNode::Leaf(LeafNode::new(schema.tag(), path)),
            NodeKind::Option(item) => CacheNode::Option(OptionNode::new(item, path, ctx)),
            NodeKind::Array(item) => {
                CacheNode::Sequence(SequenceNode::new(item.clone(), path, Arc::clone(ctx), false))
            }
            NodeKind::NonEmptyArray(item) => {
                CacheNode::Sequence(SequenceNode::new(item.clone(), path, Arc::clone(ctx), true))
            }
            NodeKind::Map { .. } => {
                CacheNode::Map(MapNode::new(schema.clone(), path, Arc::clone(ctx)))
            }
            NodeKind::Type { .. } => {
                CacheNode::Record(RecordNode::new(schema.clone(), path, Arc::clone(ctx)))
            }
            NodeKind::Sum { .. } => {
                CacheNode::Sum(SumNode::new(schema.clone(), path, Arc::clone(ctx)))
            }
            // unwrap_mutation above leaves no Mutation node
            NodeKind::Mutation(result) => return Self::build(result, path, ctx),
        };
        Arc::new(node)
    }

    /// Reconstruct the value selected by `request`, or `None` if any selected part is missing
    pub(crate) fn read(&self, request: &SchemaNode, variables: &Value) -> Option<Value> {
        let request = request.unwrap_mutation();
        match self {
            CacheNode::Leaf(node) => node.read(),
            CacheNode::Record(node) => node.read(request, variables),
            CacheNode::Sequence(node) => node.read(request, variables),
            CacheNode::Map(node) => node.read(request, variables),
            CacheNode::Sum(node) => node.read(request, variables),
            CacheNode::Option(node) => node.read(request, variables),
        }
    }

    /// Merge `data` into this node
    pub(crate) fn write<'a>(
        &'a self,
        variables: &'a Value,
        data: Value,
    ) -> BoxFuture<'a, Result<Eviction>> {
        match self {
            CacheNode::Leaf(node) => future::ready(node.write(data)).boxed(),
            CacheNode::Record(node) => node.write(variables, data).boxed(),
            CacheNode::Sequence(node) => node.write(variables, data).boxed(),
            CacheNode::Map(node) => node.write(variables, data).boxed(),
            CacheNode::Sum(node) => node.write(variables, data).boxed(),
            CacheNode::Option(node) => node.write(variables, data).boxed(),
        }
    }

    /// Live handles for the part of this node selected by `request`
    pub(crate) fn to_entries(&self, request: &SchemaNode, variables: &Value) -> Entry {
        let request = request.unwrap_mutation();
        match self {
            CacheNode::Leaf(node) => node.to_entries(),
            CacheNode::Record(node) => node.to_entries(request, variables),
            CacheNode::Sequence(node) => node.to_entries(request, variables),
            CacheNode::Map(node) => node.to_entries(request, variables),
            CacheNode::Sum(node) => node.to_entries(request, variables),
            CacheNode::Option(node) => node.to_entries(request, variables),
        }
    }
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it
pub(crate) fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// JSON kind name for diagnostics
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn shape_mismatch(
    path: &Path,
    expected: impl Into<String>,
    found: &Value,
) -> CacheError {
    CacheError::ShapeMismatch {
        path: path.to_string(),
        expected: expected.into(),
        found: kind_of(found).to_string(),
    }
}

/// Cooperative yield point for bulk writes
pub(crate) async fn pace(position: usize, every: usize) {
    if position > 0 && position % every == 0 {
        tokio::task::yield_now().await;
    }
}
