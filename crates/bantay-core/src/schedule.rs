// ── Cancellable scheduled tasks ──
//
// Reconnect and debounce timers are `ScheduledTask`s: a spawned task that
// sleeps, then runs its work, and can be cancelled at any point. Dropping
// the handle cancels it. A `TaskSlot` holds at most one pending task for a
// purpose; scheduling into it cancels whatever was there.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct ScheduledTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `work` after `delay` unless cancelled first.
    pub fn after<F>(delay: Duration, work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(CancellationToken::new(), delay, work)
    }

    /// Like [`after`](Self::after), also cancelled when `parent` is.
    pub fn after_in<F>(parent: &CancellationToken, delay: Duration, work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(parent.child_token(), delay, work)
    }

    fn spawn<F>(cancel: CancellationToken, delay: Duration, work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = async {
                    tokio::time::sleep(delay).await;
                    work.await;
                } => {}
            }
        });
        Self { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// `true` once the work ran to completion or the task was cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Holds the single pending task for one purpose.
#[derive(Debug, Default)]
pub struct TaskSlot {
    current: Mutex<Option<ScheduledTask>>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `task`, cancelling the one it supersedes.
    pub fn replace(&self, task: ScheduledTask) {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Cancel the pending task, if any. Returns `true` if one was pending.
    pub fn cancel(&self) -> bool {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        previous.is_some_and(|task| {
            let pending = !task.is_finished();
            task.cancel();
            pending
        })
    }

    /// `true` while a scheduled task has not yet finished.
    pub fn is_pending(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}
