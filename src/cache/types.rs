//! Core type definitions for the cache system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::watch;

/// Live handles exposed for an external reactive layer
///
/// Leaf handles are `watch` receivers over the stored slot, so they observe
/// later writes and evictions. Collections additionally expose a revision
/// counter that changes whenever entries are added or removed.
#[derive(Debug, Clone)]
pub enum Entry {
    /// Nothing cached at this position
    Absent,
    /// An optional value explicitly written as none
    Null,
    Value(watch::Receiver<Option<Value>>),
    Record(BTreeMap<String, Entry>),
    List {
        items: Vec<Entry>,
        changes: watch::Receiver<u64>,
    },
    Map {
        entries: BTreeMap<String, Entry>,
        changes: watch::Receiver<u64>,
    },
    Sum {
        typename: String,
        entry: Box<Entry>,
        changes: watch::Receiver<u64>,
    },
}

impl Entry {
    pub fn is_absent(&self) -> bool {
        matches!(self, Entry::Absent)
    }

    /// Member of a record or entry of a map
    pub fn get(&self, key: &str) -> Option<&Entry> {
        match self {
            Entry::Record(members) => members.get(key),
            Entry::Map { entries, .. } => entries.get(key),
            Entry::Sum { entry, .. } => entry.get(key),
            _ => None,
        }
    }

    /// Item of a list
    pub fn at(&self, index: usize) -> Option<&Entry> {
        match self {
            Entry::List { items, .. } => items.get(index),
            _ => None,
        }
    }

    /// Structural revision receiver of a collection or sum
    pub fn changes(&self) -> Option<&watch::Receiver<u64>> {
        match self {
            Entry::List { changes, .. }
            | Entry::Map { changes, .. }
            | Entry::Sum { changes, .. } => {
                Some(changes)
            }
            _ => None,
        }
    }

    /// Current values behind the handles.
    ///
    /// Unlike a cache read, this does not require every member to be present:
    /// absent members are left out.
    pub fn snapshot(&self) -> Option<Value> {
        match self {
            Entry::Absent => None,
            Entry::Null => Some(Value::Null),
            Entry::Value(rx) => rx.borrow().clone(),
            Entry::Record(members) | Entry::Map { entries: members, .. } => {
                let object: Map<String, Value> = members
                    .iter()
                    .filter_map(|(key, entry)| entry.snapshot().map(|value| (key.clone(), value)))
                    .collect();
                Some(Value::Object(object))
            }
            Entry::List { items, .. } => Some(Value::Array(
                items.iter().filter_map(Entry::snapshot).collect(),
            )),
            Entry::Sum {
                typename, entry, ..
            } => {
                let mut value = entry.snapshot()?;
                if let Value::Object(object) = &mut value {
                    object.insert("__typename".to_string(), Value::String(typename.clone()));
                }
                Some(value)
            }
        }
    }
}

/// Statistics for cache activity monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheStats {
    /// Top-level writes applied
    pub writes: u64,

    /// Top-level writes rejected with an error
    pub failed_writes: u64,

    /// Top-level evictions invoked
    pub evictions: u64,

    /// Top-level reads
    pub reads: u64,

    /// Reads that found every selected value
    pub hits: u64,

    /// Reads that came back absent
    pub misses: u64,

    /// When the last write was applied
    pub last_write_at: Option<DateTime<Utc>>,
}

impl CacheStats {
    /// Calculate read hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate read miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    pub(crate) fn record_read(&mut self, hit: bool) {
        self.reads += 1;
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub(crate) fn record_write(&mut self, ok: bool) {
        if ok {
            self.writes += 1;
            self.last_write_at = Some(Utc::now());
        } else {
            self.failed_writes += 1;
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ writes: {}, failed_writes: {}, evictions: {}, reads: {}, \
             hit_rate: {:.2}% }}",
            self.writes,
            self.failed_writes,
            self.evictions,
            self.reads,
            self.hit_rate()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_stats_hit_rate() {
        let mut stats = CacheStats::default();
        for _ in 0..8 {
            stats.record_read(true);
        }
        for _ in 0..2 {
            stats.record_read(false);
        }

        assert_eq!(stats.reads, 10);
        assert_eq!(stats.hit_rate(), 80.0);
        assert_eq!(stats.miss_rate(), 20.0);
    }

    #[test]
    fn test_cache_stats_zero_requests() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.miss_rate(), 100.0);
    }

    #[test]
    fn test_record_write() {
        let mut stats = CacheStats::default();
        stats.record_write(true);
        stats.record_write(false);

        assert_eq!(stats.writes, 1);
        assert_eq!(stats.failed_writes, 1);
        assert!(stats.last_write_at.is_some());
    }

    #[test]
    fn test_cache_stats_display() {
        let stats = CacheStats {
            writes: 3,
            evictions: 1,
            ..Default::default()
        };

        let display = format!("{}", stats);
        assert!(display.contains("writes: 3"));
        assert!(display.contains("evictions: 1"));
    }

    #[test]
    fn test_entry_snapshot_skips_absent_members() {
        let (_tx, rx) = watch::channel(Some(json!("Ann")));
        let (_changes_tx, changes) = watch::channel(0);
        let entry = Entry::Record(BTreeMap::from([
            ("name".to_string(), Entry::Value(rx)),
            ("age".to_string(), Entry::Absent),
            (
                "tags".to_string(),
                Entry::List {
                    items: vec![Entry::Null],
                    changes,
                },
            ),
        ]));

        assert_eq!(entry.snapshot(), Some(json!({"name": "Ann", "tags": [null]})));
        assert!(entry.get("age").unwrap().is_absent());
        assert!(entry.get("tags").unwrap().changes().is_some());
        assert!(entry.get("tags").unwrap().at(0).is_some());
    }
}
