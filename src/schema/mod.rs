//! Schema description module
//!
//! This module defines the immutable node descriptors a cache is built from,
//! the paths that address positions inside a cache, variable encoding for
//! parameterized members, and the request/schema compatibility check.

pub mod path;
pub mod types;
pub mod validate;
pub mod variables;

pub use path::{Path, PathSegment};
pub use types::{CacheId, NodeKind, SchemaNode, Tag};
pub use validate::{validate, ValidationError, ValidationErrors};
pub use variables::encode_variables;
