//! Cancellable handle for callback-mode requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures::future::BoxFuture;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::Result;

const PENDING: u8 = 0;
const COMPLETED: u8 = 1;
const CANCELLED: u8 = 2;

/// Lifecycle of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// The request is in flight.
    Pending,
    /// The callback has been (or is being) invoked.
    Completed,
    /// The task was cancelled before it completed; the callback never runs.
    Cancelled,
}

/// Handle to an in-flight request started in callback mode.
///
/// Exactly one of completion and cancellation wins. Cancelling before the
/// result is delivered guarantees the callback is never invoked; cancelling
/// afterwards does nothing.
#[derive(Debug)]
pub struct Task {
    id: Uuid,
    state: Arc<AtomicU8>,
    abort: AbortHandle,
}

impl Task {
    /// Spawn `fut` on the current Tokio runtime and hand its output to
    /// `callback` unless the task is cancelled first.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub(crate) fn spawn<T, F>(fut: BoxFuture<'static, Result<T>>, callback: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(PENDING));
        let guard = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            let result = fut.await;
            if guard
                .compare_exchange(PENDING, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                callback(result);
            }
        });

        Self {
            id: Uuid::new_v4(),
            state,
            abort: handle.abort_handle(),
        }
    }

    /// Unique identifier of this task.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        match self.state.load(Ordering::Acquire) {
            PENDING => TaskState::Pending,
            COMPLETED => TaskState::Completed,
            _ => TaskState::Cancelled,
        }
    }

    /// Cancel the request.
    ///
    /// Returns `true` if this call cancelled it; `false` if the task had
    /// already completed or been cancelled.
    pub fn cancel(&self) -> bool {
        let won = self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.abort.abort();
        }
        won
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use futures::FutureExt;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn delivers_result_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = Task::spawn(async { Ok::<_, Error>(7) }.boxed(), move |r| {
            let _ = tx.send(r);
        });

        assert_eq!(rx.recv().await, Some(Ok(7)));
        assert_eq!(rx.recv().await, None);
        assert_eq!(task.state(), TaskState::Completed);
        assert!(!task.cancel());
        assert_eq!(task.state(), TaskState::Completed);
    }

    #[tokio::test]
    async fn cancel_before_completion_suppresses_callback() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Result<u32>>();
        let task = Task::spawn(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            }
            .boxed(),
            move |r| {
                let _ = tx.send(r);
            },
        );

        assert!(task.cancel());
        assert!(!task.cancel());
        assert_eq!(task.state(), TaskState::Cancelled);
        // The sender is dropped with the aborted future.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let a = Task::spawn(async { Ok::<_, Error>(()) }.boxed(), |_| {});
        let b = Task::spawn(async { Ok::<_, Error>(()) }.boxed(), |_| {});
        assert_ne!(a.id(), b.id());
    }
}
