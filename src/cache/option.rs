//! Option nodes: a presence flag over an eagerly built child

use crate::cache::eviction::Eviction;
use crate::cache::slot::Slot;
use crate::cache::types::Entry;
use crate::cache::{CacheNode, Context};
use crate::error::Result;
use crate::schema::{Path, SchemaNode};
use serde_json::Value;
use std::sync::Arc;

/// `None` while nothing was written, `Some(false)` after an explicit none,
/// `Some(true)` while the child holds the value.
type Presence = Option<bool>;

pub(crate) struct OptionNode {
    presence: Arc<Slot<Presence>>,
    child: Arc<CacheNode>,
}

impl OptionNode {
    /// The child shares this node's path
    pub(crate) fn new(item: &SchemaNode, path: Path, ctx: &Arc<Context>) -> Self {
        Self {
            presence: Arc::new(Slot::new(None)),
            child: CacheNode::build(item, path, ctx),
        }
    }

    fn mark_none(&self) -> Eviction {
        let (previous, stamp) = self.presence.replace(Some(false));
        let presence = Arc::clone(&self.presence);
        Eviction::new(move || {
            presence.restore(stamp, previous);
        })
    }

    /// `null` marks the option as none and leaves the child untouched
    pub(crate) async fn write(&self, variables: &Value, data: Value) -> Result<Eviction> {
        if data.is_null() {
            return Ok(self.mark_none());
        }

        let written = self.child.write(variables, data).await?;
        if self.presence.get() == Some(true) {
            return Ok(written);
        }

        // The child is reverted only together with the flag, while this write is current.
        let (previous, stamp) = self.presence.replace(Some(true));
        let presence = Arc::clone(&self.presence);
        Ok(Eviction::new(move || {
            if presence.restore(stamp, previous) {
                written.evict();
            }
        }))
    }

    pub(crate) fn read(&self, request: &SchemaNode, variables: &Value) -> Option<Value> {
        match self.presence.get() {
            None => None,
            Some(false) => Some(Value::Null),
            Some(true) => self.child.read(inner(request), variables),
        }
    }

    pub(crate) fn to_entries(&self, request: &SchemaNode, variables: &Value) -> Entry {
        match self.presence.get() {
            None => Entry::Absent,
            Some(false) => Entry::Null,
            Some(true) => self.child.to_entries(inner(request), variables),
        }
    }
}

fn inner(request: &SchemaNode) -> &SchemaNode {
    request.item().unwrap_or(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use serde_json::json;

    fn node(schema: &SchemaNode) -> Arc<CacheNode> {
        let ctx = Context::new(CacheConfig::default());
        CacheNode::build(schema, Path::root("root"), &ctx)
    }

    #[tokio::test]
    async fn test_unset_none_and_some() {
        let schema = SchemaNode::option(SchemaNode::int());
        let node = node(&schema);
        let vars = json!({});

        assert_eq!(node.read(&schema, &vars), None);

        node.write(&vars, Value::Null).await.unwrap();
        assert_eq!(node.read(&schema, &vars), Some(Value::Null));

        node.write(&vars, json!(5)).await.unwrap();
        assert_eq!(node.read(&schema, &vars), Some(json!(5)));
    }

    #[tokio::test]
    async fn test_flip_back_to_none_and_evict() {
        let schema = SchemaNode::option(SchemaNode::int());
        let node = node(&schema);
        let vars = json!({});

        node.write(&vars, json!(5)).await.unwrap();
        let none = node.write(&vars, Value::Null).await.unwrap();
        assert_eq!(node.read(&schema, &vars), Some(Value::Null));

        none.evict();
        assert_eq!(node.read(&schema, &vars), Some(json!(5)));
    }

    #[tokio::test]
    async fn test_superseded_some_keeps_hidden_value() {
        let schema = SchemaNode::option(SchemaNode::string());
        let node = node(&schema);
        let vars = json!({});

        let some = node.write(&vars, json!("1")).await.unwrap();
        let none = node.write(&vars, Value::Null).await.unwrap();

        some.evict();
        assert_eq!(node.read(&schema, &vars), Some(Value::Null));

        none.evict();
        assert_eq!(node.read(&schema, &vars), Some(json!("1")));
    }

    #[tokio::test]
    async fn test_first_write_evicts_to_unset() {
        let schema = SchemaNode::option(SchemaNode::string());
        let node = node(&schema);
        let vars = json!({});

        let eviction = node.write(&vars, json!("x")).await.unwrap();
        eviction.evict();
        assert_eq!(node.read(&schema, &vars), None);
    }

    #[tokio::test]
    async fn test_failed_child_write_keeps_flag() {
        let schema = SchemaNode::option(SchemaNode::int());
        let node = node(&schema);
        let vars = json!({});

        node.write(&vars, Value::Null).await.unwrap();
        assert!(node.write(&vars, json!("five")).await.is_err());
        assert_eq!(node.read(&schema, &vars), Some(Value::Null));
    }

    #[tokio::test]
    async fn test_entries_reflect_presence() {
        let schema = SchemaNode::option(SchemaNode::int());
        let node = node(&schema);
        let vars = json!({});

        assert!(node.to_entries(&schema, &vars).is_absent());
        node.write(&vars, Value::Null).await.unwrap();
        assert!(matches!(node.to_entries(&schema, &vars), Entry::Null));
        node.write(&vars, json!(1)).await.unwrap();
        assert_eq!(node.to_entries(&schema, &vars).snapshot(), Some(json!(1)));
    }
}
