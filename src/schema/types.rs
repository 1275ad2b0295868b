//! Type definitions for schema node descriptors

use crate::schema::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Custom identity hook: `(path, variables, partial data) -> id`.
///
/// Returning `None` (or an empty string) leaves the node unresolved, and the
/// hook is asked again on the next access.
pub type CacheId = Arc<dyn Fn(&Path, &Value, Option<&Value>) -> Option<String> + Send + Sync>;

/// Node tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    String,
    Int,
    Float,
    Boolean,
    Scalar,
    Option,
    Array,
    NonEmptyArray,
    Map,
    Type,
    Sum,
    Mutation,
}

impl Tag {
    /// Tag name as used in diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::String => "String",
            Tag::Int => "Int",
            Tag::Float => "Float",
            Tag::Boolean => "Boolean",
            Tag::Scalar => "Scalar",
            Tag::Option => "Option",
            Tag::Array => "Array",
            Tag::NonEmptyArray => "NonEmptyArray",
            Tag::Map => "Map",
            Tag::Type => "Type",
            Tag::Sum => "Sum",
            Tag::Mutation => "Mutation",
        }
    }

    /// Whether nodes with this tag hold a single value
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Tag::String | Tag::Int | Tag::Float | Tag::Boolean | Tag::Scalar
        )
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a schema node
#[derive(Debug, Clone)]
pub enum NodeKind {
    String,
    Int,
    Float,
    Boolean,
    /// Custom scalar; its codec lives outside the cache
    Scalar { name: String, strict: bool },
    Option(SchemaNode),
    Array(SchemaNode),
    NonEmptyArray(SchemaNode),
    Map { key: SchemaNode, item: SchemaNode },
    Type {
        typename: String,
        members: BTreeMap<String, SchemaNode>,
    },
    /// Members keyed by typename
    Sum { members: BTreeMap<String, SchemaNode> },
    Mutation(SchemaNode),
}

impl NodeKind {
    pub fn tag(&self) -> Tag {
        match self {
            NodeKind::String => Tag::String,
            NodeKind::Int => Tag::Int,
            NodeKind::Float => Tag::Float,
            NodeKind::Boolean => Tag::Boolean,
            NodeKind::Scalar { .. } => Tag::Scalar,
            NodeKind::Option(_) => Tag::Option,
            NodeKind::Array(_) => Tag::Array,
            NodeKind::NonEmptyArray(_) => Tag::NonEmptyArray,
            NodeKind::Map { .. } => Tag::Map,
            NodeKind::Type { .. } => Tag::Type,
            NodeKind::Sum { .. } => Tag::Sum,
            NodeKind::Mutation(_) => Tag::Mutation,
        }
    }
}

#[derive(Clone)]
struct NodeDef {
    kind: NodeKind,
    variables: BTreeMap<String, SchemaNode>,
    entity: bool,
    cache_id: Option<CacheId>,
}

/// Immutable schema node, shared by every cache built from it
///
/// Cloning is cheap: the descriptor lives behind an `Arc`.
#[derive(Clone)]
pub struct SchemaNode(Arc<NodeDef>);

impl SchemaNode {
    fn from_kind(kind: NodeKind) -> Self {
        Self(Arc::new(NodeDef {
            kind,
            variables: BTreeMap::new(),
            entity: false,
            cache_id: None,
        }))
    }

    fn map_def(self, f: impl FnOnce(&mut NodeDef)) -> Self {
        let mut def = Arc::unwrap_or_clone(self.0);
        f(&mut def);
        Self(Arc::new(def))
    }

    pub fn string() -> Self {
        Self::from_kind(NodeKind::String)
    }

    pub fn int() -> Self {
        Self::from_kind(NodeKind::Int)
    }

    pub fn float() -> Self {
        Self::from_kind(NodeKind::Float)
    }

    pub fn boolean() -> Self {
        Self::from_kind(NodeKind::Boolean)
    }

    /// Custom scalar. `strict` scalars only accept requests declaring the same mode.
    pub fn scalar(name: impl Into<String>, strict: bool) -> Self {
        Self::from_kind(NodeKind::Scalar {
            name: name.into(),
            strict,
        })
    }

    pub fn option(item: SchemaNode) -> Self {
        Self::from_kind(NodeKind::Option(item))
    }

    pub fn array(item: SchemaNode) -> Self {
        Self::from_kind(NodeKind::Array(item))
    }

    pub fn non_empty_array(item: SchemaNode) -> Self {
        Self::from_kind(NodeKind::NonEmptyArray(item))
    }

    pub fn map(key: SchemaNode, item: SchemaNode) -> Self {
        Self::from_kind(NodeKind::Map { key, item })
    }

    /// Composite record with named members
    pub fn object<K: Into<String>>(
        typename: impl Into<String>,
        members: impl IntoIterator<Item = (K, SchemaNode)>,
    ) -> Self {
        Self::from_kind(NodeKind::Type {
            typename: typename.into(),
            members: members.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    /// Sum over object nodes, keyed by each member's typename.
    ///
    /// Members without a typename are ignored.
    pub fn sum(members: impl IntoIterator<Item = SchemaNode>) -> Self {
        let members = members
            .into_iter()
            .filter_map(|member| member.typename().map(|t| (t.to_string(), member.clone())))
            .collect();
        Self::from_kind(NodeKind::Sum { members })
    }

    pub fn mutation(result: SchemaNode) -> Self {
        Self::from_kind(NodeKind::Mutation(result))
    }

    /// Declare a variable this node depends on
    pub fn with_variable(self, name: impl Into<String>, node: SchemaNode) -> Self {
        let name = name.into();
        self.map_def(|def| {
            def.variables.insert(name, node);
        })
    }

    /// Declare several variables at once
    pub fn with_variables<K: Into<String>>(
        self,
        variables: impl IntoIterator<Item = (K, SchemaNode)>,
    ) -> Self {
        self.map_def(|def| {
            def.variables
                .extend(variables.into_iter().map(|(k, v)| (k.into(), v)));
        })
    }

    /// Store the whole value in one slot instead of normalizing it
    pub fn as_entity(self) -> Self {
        self.map_def(|def| def.entity = true)
    }

    /// Attach a custom identity hook (Type and Map nodes)
    pub fn with_cache_id<F>(self, to_id: F) -> Self
    where
        F: Fn(&Path, &Value, Option<&Value>) -> Option<String> + Send + Sync + 'static,
    {
        self.map_def(|def| def.cache_id = Some(Arc::new(to_id)))
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    pub fn tag(&self) -> Tag {
        self.0.kind.tag()
    }

    pub fn variables(&self) -> &BTreeMap<String, SchemaNode> {
        &self.0.variables
    }

    pub fn is_entity(&self) -> bool {
        self.0.entity
    }

    pub fn cache_id(&self) -> Option<&CacheId> {
        self.0.cache_id.as_ref()
    }

    /// Typename of a Type node
    pub fn typename(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Type { typename, .. } => Some(typename),
            _ => None,
        }
    }

    /// Members of a Type or Sum node
    pub fn members(&self) -> Option<&BTreeMap<String, SchemaNode>> {
        match &self.0.kind {
            NodeKind::Type { members, .. } | NodeKind::Sum { members } => Some(members),
            _ => None,
        }
    }

    /// Wrapped item of an Option, Array, NonEmptyArray or Map node
    pub fn item(&self) -> Option<&SchemaNode> {
        match &self.0.kind {
            NodeKind::Option(item)
            | NodeKind::Array(item)
            | NodeKind::NonEmptyArray(item)
            | NodeKind::Map { item, .. } => Some(item),
            _ => None,
        }
    }

    /// Follow Mutation nodes down to their result
    pub fn unwrap_mutation(&self) -> &SchemaNode {
        let mut node = self;
        while let NodeKind::Mutation(result) = &node.0.kind {
            node = result;
        }
        node
    }
}

impl fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaNode")
            .field("kind", &self.0.kind)
            .field("variables", &self.0.variables)
            .field("entity", &self.0.entity)
            .field("cache_id", &self.0.cache_id.is_some())
            .finish()
    }
}
