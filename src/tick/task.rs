//! Task types for the tick driver.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

/// Unique identifier for a spawned task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Creates a new unique task ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Where a task leaves its output.
pub(crate) struct Slot<T> {
    value: Option<T>,
    finished: bool,
    waker: Option<Waker>,
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self {
            value: None,
            finished: false,
            waker: None,
        }
    }
}

/// Handle to a task running on a session's tick driver.
///
/// The handle is itself a future resolving to the task's output, so it can
/// be awaited directly or passed to [`assert_settled`](crate::assert_settled).
/// Once the output has been taken, by [`take`](Self::take) or by awaiting,
/// it is gone; a later await never completes.
pub struct TaskHandle<T> {
    /// The task's unique identifier.
    pub id: TaskId,
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(id: TaskId, slot: Arc<Mutex<Slot<T>>>) -> Self {
        Self { id, slot }
    }

    /// Returns a clone of the output if the task has completed.
    #[must_use]
    pub fn try_get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.slot.lock().value.clone()
    }

    /// Takes the output if the task has completed and it was not taken yet.
    #[must_use]
    pub fn take(&self) -> Option<T> {
        self.slot.lock().value.take()
    }

    /// Returns `true` once the task has run to completion.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slot.lock().finished
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut slot = self.slot.lock();
        match slot.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("is_complete", &self.is_complete())
            .finish_non_exhaustive()
    }
}

/// Type-erased boxed future.
pub(crate) type BoxTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Internal task representation.
pub(crate) struct Task {
    pub id: TaskId,
    pub polls: usize,
    future: BoxTask,
}

impl Task {
    /// Creates a new task wrapping a future.
    pub fn new<F, T>(future: F, slot: Arc<Mutex<Slot<T>>>) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let wrapped = async move {
            let output = future.await;
            let waker = {
                let mut slot = slot.lock();
                slot.value = Some(output);
                slot.finished = true;
                slot.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        };

        Self {
            id: TaskId::new(),
            polls: 0,
            future: Box::pin(wrapped),
        }
    }

    /// Polls the task once.
    pub fn poll(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        self.polls += 1;
        self.future.as_mut().poll(cx)
    }
}
