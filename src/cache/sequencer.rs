//! Submission-order gate for top-level writes

use crate::cache::locked;
use std::sync::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Chain of turns; each turn waits for the one reserved before it
#[derive(Default)]
pub(crate) struct WriteSequencer {
    tail: Mutex<Option<oneshot::Receiver<()>>>,
}

impl WriteSequencer {
    /// Reserve the next turn. Must be called synchronously at submission time.
    pub(crate) fn enqueue(&self) -> Turn {
        let (done, next) = oneshot::channel();
        let previous = locked(&self.tail).replace(next);
        Turn {
            previous,
            done: Some(done),
        }
    }
}

/// A reserved turn; it finishes when dropped
pub(crate) struct Turn {
    previous: Option<oneshot::Receiver<()>>,
    done: Option<oneshot::Sender<()>>,
}

impl Turn {
    /// Resolve once every earlier turn has finished
    pub(crate) async fn wait(&mut self) {
        if let Some(previous) = self.previous.take() {
            // a dropped sender also means the earlier turn is over
            let _ = previous.await;
        }
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        // Abandoned before its turn came: keep later turns behind the earlier ones.
        if let (Some(previous), Some(done)) = (self.previous.take(), self.done.take()) {
            if let Ok(handle) = Handle::try_current() {
                handle.spawn(async move {
                    let _ = previous.await;
                    drop(done);
                });
            }
        }
    }
}
