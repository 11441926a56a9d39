//! The `TickDriver` implementation.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Wake, Waker};

use parking_lot::Mutex;
use tracing::trace;

use crate::tick::task::{Slot, Task, TaskHandle, TaskId};

/// Cooperative single-threaded driver for the code under test.
///
/// Tasks run only when the driver is told to. [`spawn`](Self::spawn) polls
/// a new task once, right away; after that, each [`turn`](Self::turn)
/// polls every task that was woken before the turn started, exactly once.
/// Tasks woken during a turn wait for the next one.
#[derive(Clone, Default)]
pub(crate) struct TickDriver {
    inner: Arc<DriverInner>,
}

#[derive(Default)]
struct DriverInner {
    /// Tasks woken since they were last polled.
    ready: Mutex<VecDeque<Task>>,
    /// Tasks waiting for an external wake.
    waiting: Mutex<Vec<Task>>,
}

impl TickDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a task, running it up to its first suspension point.
    pub fn spawn<F, T>(&self, future: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Slot::new()));
        let task = Task::new(future, Arc::clone(&slot));
        let id = task.id;
        trace!(task = %id, "task spawned");

        self.poll_task(task);
        TaskHandle::new(id, slot)
    }

    /// Runs one turn. Returns the number of tasks polled.
    pub fn turn(&self) -> usize {
        let batch: Vec<Task> = self.inner.ready.lock().drain(..).collect();
        let polled = batch.len();
        for task in batch {
            self.poll_task(task);
        }
        polled
    }

    /// Drops every unfinished task. Returns how many were dropped.
    pub fn abandon(&self) -> usize {
        let ready: Vec<Task> = self.inner.ready.lock().drain(..).collect();
        let waiting: Vec<Task> = std::mem::take(&mut *self.inner.waiting.lock());
        ready.len() + waiting.len()
    }

    /// Number of tasks ready for the next turn.
    pub fn ready_count(&self) -> usize {
        self.inner.ready.lock().len()
    }

    /// Number of tasks waiting on a wake.
    pub fn waiting_count(&self) -> usize {
        self.inner.waiting.lock().len()
    }

    fn poll_task(&self, mut task: Task) {
        let (waker, woken) = self.create_waker(task.id);
        let mut cx = Context::from_waker(&waker);

        match task.poll(&mut cx) {
            Poll::Ready(()) => {
                trace!(task = %task.id, polls = task.polls, "task completed");
            }
            Poll::Pending => {
                let mut waiting = self.inner.waiting.lock();
                if *woken.lock() {
                    // Woke itself while being polled
                    self.inner.ready.lock().push_back(task);
                } else {
                    waiting.push(task);
                }
            }
        }
    }

    fn create_waker(&self, id: TaskId) -> (Waker, Arc<Mutex<bool>>) {
        let woken = Arc::new(Mutex::new(false));
        let waker = TaskWaker {
            driver: Arc::downgrade(&self.inner),
            id,
            woken_during_poll: Arc::clone(&woken),
        };
        (Waker::from(Arc::new(waker)), woken)
    }
}

impl fmt::Debug for TickDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickDriver")
            .field("ready", &self.ready_count())
            .field("waiting", &self.waiting_count())
            .finish()
    }
}

/// Waker that moves its task from `waiting` to `ready`.
///
/// Holds the driver weakly: wakers end up stored inside the tasks' own
/// futures.
struct TaskWaker {
    driver: Weak<DriverInner>,
    id: TaskId,
    woken_during_poll: Arc<Mutex<bool>>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let Some(driver) = self.driver.upgrade() else {
            return;
        };
        let mut waiting = driver.waiting.lock();
        if let Some(pos) = waiting.iter().position(|t| t.id == self.id) {
            let task = waiting.remove(pos);
            driver.ready.lock().push_back(task);
        } else {
            *self.woken_during_poll.lock() = true;
        }
    }
}
