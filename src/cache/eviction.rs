//! Eviction handles and their composition
//!
//! An eviction undoes the storage mutations of exactly one write. Each
//! underlying action is a compare-and-restore: it only reverts state that is
//! still what the write left behind, so stale or repeated evictions are
//! silent no-ops.

use crate::error::Result;
use std::fmt;
use std::sync::Arc;

type Action = Arc<dyn Fn() + Send + Sync>;

/// Undo handle returned by every write
#[derive(Clone, Default)]
pub struct Eviction {
    actions: Vec<Action>,
}

impl Eviction {
    /// An eviction that does nothing
    pub fn noop() -> Self {
        Self::default()
    }

    pub(crate) fn new(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            actions: vec![Arc::new(action)],
        }
    }

    /// Compose several evictions into one that runs all of them
    pub fn all(evictions: impl IntoIterator<Item = Eviction>) -> Self {
        Self {
            actions: evictions
                .into_iter()
                .flat_map(|eviction| eviction.actions)
                .collect(),
        }
    }

    /// Revert the write this eviction belongs to
    pub fn evict(&self) {
        for action in &self.actions {
            action();
        }
    }

    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of undo actions collected
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_noop()
    }
}

impl fmt::Debug for Eviction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Eviction")
            .field("actions", &self.actions.len())
            .finish()
    }
}

/// Fold the outcome of a write fan-out into one eviction.
///
/// When any part failed, the parts that succeeded are evicted and the first
/// error is returned, so a failed write leaves no trace.
pub(crate) fn settle(results: impl IntoIterator<Item = Result<Eviction>>) -> Result<Eviction> {
    let mut done = Vec::new();
    let mut failure = None;

    for result in results {
        match result {
            Ok(eviction) => done.push(eviction),
            Err(err) => {
                if failure.is_none() {
                    failure = Some(err);
                }
            }
        }
    }

    let eviction = Eviction::all(done);
    match failure {
        Some(err) => {
            eviction.evict();
            Err(err)
        }
        None => Ok(eviction),
    }
}
