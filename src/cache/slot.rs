//! Observable storage cells with compare-and-restore

use crate::cache::locked;
use std::sync::Mutex;
use tokio::sync::watch;

/// Identifies one mutation of a [`Slot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stamp(u64);

/// Observable cell whose mutations can be undone while they are still the latest
///
/// Every `replace` and every successful `restore` takes a fresh stamp, so an
/// undo only applies when nothing has touched the cell since.
pub(crate) struct Slot<T> {
    stamp: Mutex<u64>,
    tx: watch::Sender<T>,
}

impl<T: Clone> Slot<T> {
    pub(crate) fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            stamp: Mutex::new(0),
            tx,
        }
    }

    pub(crate) fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Store `value`, returning the previous value and the stamp of this mutation
    pub(crate) fn replace(&self, value: T) -> (T, Stamp) {
        let mut stamp = locked(&self.stamp);
        *stamp += 1;
        let previous = self.tx.send_replace(value);
        (previous, Stamp(*stamp))
    }

    /// Put `previous` back if `stamp` is still the latest mutation
    pub(crate) fn restore(&self, stamp: Stamp, previous: T) -> bool {
        let mut current = locked(&self.stamp);
        if *current != stamp.0 {
            return false;
        }
        *current += 1;
        self.tx.send_replace(previous);
        true
    }
}

/// Counter bumped on structural change of a collection
pub(crate) struct Revision(watch::Sender<u64>);

impl Revision {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self(tx)
    }

    pub(crate) fn bump(&self) {
        self.0.send_modify(|revision| *revision += 1);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.0.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_restore() {
        let slot = Slot::new(None);
        let (previous, stamp) = slot.replace(Some(1));
        assert_eq!(previous, None);
        assert_eq!(slot.get(), Some(1));

        assert!(slot.restore(stamp, previous));
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn test_superseded_restore_is_noop() {
        let slot = Slot::new(0);
        let (first_prev, first) = slot.replace(1);
        let (second_prev, second) = slot.replace(2);

        assert!(!slot.restore(first, first_prev));
        assert_eq!(slot.get(), 2);

        assert!(slot.restore(second, second_prev));
        assert_eq!(slot.get(), 1);

        // The restoration is itself a mutation, so the first write stays stale.
        assert!(!slot.restore(first, first_prev));
        assert_eq!(slot.get(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let slot = Slot::new("a".to_string());
        let mut rx = slot.subscribe();

        slot.replace("b".to_string());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), "b");
    }

    #[test]
    fn test_revision_bump() {
        let revision = Revision::new();
        let rx = revision.subscribe();
        revision.bump();
        revision.bump();
        assert_eq!(*rx.borrow(), 2);
    }
}
