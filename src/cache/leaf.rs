//! Primitive, scalar and entity nodes: one observable slot

use crate::cache::eviction::Eviction;
use crate::cache::slot::Slot;
use crate::cache::types::Entry;
use crate::cache::shape_mismatch;
use crate::error::Result;
use crate::schema::{Path, Tag};
use serde_json::Value;
use std::sync::Arc;

pub(crate) struct LeafNode {
    tag: Tag,
    path: Path,
    slot: Arc<Slot<Option<Value>>>,
}

impl LeafNode {
    pub(crate) fn new(tag: Tag, path: Path) -> Self {
        Self {
            tag,
            path,
            slot: Arc::new(Slot::new(None)),
        }
    }

    pub(crate) fn read(&self) -> Option<Value> {
        self.slot.get()
    }

    /// Replace the stored value.
    ///
    /// The eviction restores the previous value only while this write is the
    /// latest mutation of the slot.
    pub(crate) fn write(&self, value: Value) -> Result<Eviction> {
        if !accepts(self.tag, &value) {
            return Err(shape_mismatch(&self.path, self.tag.as_str(), &value));
        }

        let (previous, stamp) = self.slot.replace(Some(value));
        let slot = Arc::clone(&self.slot);
        Ok(Eviction::new(move || {
            slot.restore(stamp, previous.clone());
        }))
    }

    pub(crate) fn to_entries(&self) -> Entry {
        Entry::Value(self.slot.subscribe())
    }
}

/// JSON shape guard for primitive tags; scalars and entity values pass through
fn accepts(tag: Tag, value: &Value) -> bool {
    match tag {
        Tag::String => value.is_string(),
        Tag::Int => value.is_i64() || value.is_u64(),
        Tag::Float => value.is_number(),
        Tag::Boolean => value.is_boolean(),
        _ => true,
    }
}
