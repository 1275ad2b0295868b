//! Persistence hook
//!
//! The cache calls through this trait to save and reload session snapshots
//! but ships no implementation; storage is the embedding application's
//! concern.

use crate::error::Result;
use serde_json::Value;

/// Snapshot store injected through [`CacheConfig`](crate::cache::CacheConfig)
pub trait Persist: Send + Sync {
    /// Save `snapshot` under `key`
    fn store(&self, key: &str, snapshot: &Value) -> Result<()>;

    /// Load the snapshot saved under `key`
    fn restore(&self, key: &str) -> Result<Option<Value>>;
}
