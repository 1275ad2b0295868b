//! # Ouroboros Cache (ouroboros-cache)
//!
//! A normalized, reactive in-memory cache for schema-described graph data.
//!
//! ## Features
//!
//! - Schema trees of primitives, records, sums, arrays, maps and options
//! - Merge writes that return an eviction undoing exactly that write
//! - All-or-nothing reads over a sub-selection of the schema
//! - Entity aliasing through custom identity hooks
//! - Submission-ordered top-level writes across sessions
//! - Live `watch` handles for an external reactive layer
//!
//! ## Sessions
//!
//! A [`Cache`] owns the normalized store for one schema. Each session binds a
//! request (a sub-selection of that schema) after checking it with the
//! validator.
//!
//! ```no_run
//! use ouroboros_cache::{Cache, CacheConfig, SchemaNode};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let schema = SchemaNode::object("Query", [(
//!         "scores",
//!         SchemaNode::map(SchemaNode::string(), SchemaNode::int()),
//!     )]);
//!
//!     let cache = Cache::new(schema.clone(), CacheConfig::default())?;
//!     let session = cache.session(schema)?;
//!
//!     session.write(json!({}), json!({"scores": {"ann": 1, "bob": 2}})).await?;
//!     let delete = session.write(json!({}), json!({"scores": {"ann": null}})).await?;
//!     println!("{:?}", session.read(&json!({})));
//!
//!     delete.evict();
//!     println!("{:?}", session.read(&json!({})));
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```no_run
//! use ouroboros_cache::CacheConfig;
//!
//! # fn main() -> ouroboros_cache::Result<()> {
//! // Reads OUROBOROS_CACHE_ID, OUROBOROS_CACHE_IMMUTABLE_ARRAYS and
//! // OUROBOROS_CACHE_YIELD_EVERY, after loading a .env file if present.
//! let config = CacheConfig::from_env()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod schema;

// Re-export main types for convenience
pub use cache::{
    Cache, CacheConfig, CacheConfigBuilder, CacheSession, CacheStats, Entry, Eviction, Persist,
};
pub use error::{CacheError, Result};
pub use schema::{
    encode_variables, validate, Path, PathSegment, SchemaNode, Tag, ValidationError,
    ValidationErrors,
};
