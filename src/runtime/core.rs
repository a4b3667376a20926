//! The runloop: a single-threaded driver for time-ordered deferred actions.
//!
//! Providers post actions with a due time. [`Runloop::run`] repeatedly takes
//! the earliest entry, sleeps the whole process once if it is not due yet, and
//! invokes it. Actions resolve promises, which resume tasks, which may post
//! more actions; all of that happens synchronously inside the invocation.

use crate::builder::RunloopBuilder;
use crate::runtime::queue::{EntryId, EventQueue};
use crate::task::{JoinHandle, Task, TaskError, TaskId};
use crate::time::{Clock, Timestamp};

use thiserror::Error;

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

/// Failure of [`Runloop::block_on`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The task panicked.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// The queue drained while the task was still suspended on a promise
    /// nothing will ever resolve.
    #[error("runloop drained while task {task} was still suspended")]
    Stalled { task: TaskId },
}

/// Counters describing one call to [`Runloop::run`] or [`Runloop::run_until`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Entries removed from the queue and invoked.
    pub actions: u64,
    /// Times the process blocked waiting for the next entry.
    pub idle_waits: u64,
    /// Total time spent blocked.
    pub slept: Duration,
}

struct Shared {
    queue: RefCell<EventQueue>,
    clock: Box<dyn Clock>,
}

/// Cloneable handle for posting entries to a [`Runloop`] and reading its clock.
///
/// Providers keep a handle so they can schedule completions from anywhere,
/// including from inside an action that is currently running.
#[derive(Clone)]
pub struct Handle {
    shared: Rc<Shared>,
}

impl Handle {
    /// Current logical time.
    pub fn now(&self) -> Timestamp {
        self.shared.clock.now()
    }

    /// Schedules `action` to run at `due`.
    ///
    /// Entries due at the same instant run in the order they were posted. A
    /// due time in the past means "as soon as possible", still after every
    /// earlier-due entry.
    pub fn post<F>(&self, due: Timestamp, action: F) -> EntryId
    where
        F: FnOnce() + 'static,
    {
        let id = self.shared.queue.borrow_mut().push(due, Box::new(action));
        tracing::trace!(entry = %id, %due, "entry posted");
        id
    }

    /// Schedules `action` to run `delay` after the current logical time.
    pub fn post_after<F>(&self, delay: Duration, action: F) -> EntryId
    where
        F: FnOnce() + 'static,
    {
        self.post(self.now() + delay, action)
    }

    /// Number of entries not yet invoked.
    pub fn pending(&self) -> usize {
        self.shared.queue.borrow().len()
    }

    /// Due time of the earliest pending entry.
    pub fn next_due(&self) -> Option<Timestamp> {
        self.shared.queue.borrow().next_due()
    }

    /// Returns whether both handles belong to the same runloop.
    pub fn same_runloop(&self, other: &Handle) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Owner of the pending set and driver of the process.
///
/// Several runloops can coexist on one thread; each owns its queue and clock.
/// Dropping a runloop discards the entries it still holds.
pub struct Runloop {
    handle: Handle,
}

impl Runloop {
    /// Creates a runloop on the system clock.
    ///
    /// # Example
    /// ```ignore
    /// let rt = Runloop::new();
    /// ```
    pub fn new() -> Self {
        RunloopBuilder::new().build()
    }

    pub fn builder() -> RunloopBuilder {
        RunloopBuilder::new()
    }

    pub(crate) fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            handle: Handle {
                shared: Rc::new(Shared {
                    queue: RefCell::new(EventQueue::new()),
                    clock,
                }),
            },
        }
    }

    /// Returns a handle for posting entries to this runloop.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Current logical time.
    pub fn now(&self) -> Timestamp {
        self.handle.now()
    }

    /// See [`Handle::post`].
    pub fn post<F>(&self, due: Timestamp, action: F) -> EntryId
    where
        F: FnOnce() + 'static,
    {
        self.handle.post(due, action)
    }

    /// Spawns a task; equivalent to [`Task::spawn`].
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        Task::spawn(future)
    }

    /// Runs entries until the queue is empty.
    ///
    /// A task that keeps posting work (for example a sleep loop) keeps this
    /// call from returning; use [`Runloop::run_until`] to observe such tasks.
    pub fn run(&self) -> RunStats {
        self.drive(None)
    }

    /// Runs every entry due at or before `limit` and leaves later ones pending.
    pub fn run_until(&self, limit: Timestamp) -> RunStats {
        self.drive(Some(limit))
    }

    /// Spawns `future`, runs the queue dry, and returns the task's output.
    ///
    /// # Errors
    /// - [`RuntimeError::Task`] if the task panicked.
    /// - [`RuntimeError::Stalled`] if the queue emptied before the task finished.
    ///
    /// # Example
    /// ```ignore
    /// let rt = Runloop::new();
    /// let result = rt.block_on(async { 42 });
    /// assert_eq!(result, Ok(42));
    /// ```
    pub fn block_on<F>(&self, future: F) -> Result<F::Output, RuntimeError>
    where
        F: Future + 'static,
        F::Output: Clone + 'static,
    {
        let task = Task::spawn_observed(future);
        self.run();

        match task.peek() {
            Some(Ok(value)) => Ok(value),
            Some(Err(error)) => Err(RuntimeError::Task(error)),
            None => Err(RuntimeError::Stalled { task: task.id() }),
        }
    }

    fn drive(&self, limit: Option<Timestamp>) -> RunStats {
        let shared = &self.handle.shared;
        let mut stats = RunStats::default();

        loop {
            let Some(due) = shared.queue.borrow().next_due() else {
                break;
            };

            if limit.is_some_and(|limit| due > limit) {
                break;
            }

            let now = shared.clock.now();

            if due > now {
                let wait = due - now;
                tracing::debug!(%now, %due, ?wait, "sleeping until next entry");

                shared.clock.sleep(wait);
                stats.idle_waits += 1;
                stats.slept += wait;
                continue;
            }

            // Removed before invocation: a panicking action never runs twice.
            let entry = shared.queue.borrow_mut().pop_due(now);
            let Some(entry) = entry else {
                continue;
            };

            tracing::trace!(entry = %entry.id, due = %entry.due, %now, "running entry");
            (entry.action)();
            stats.actions += 1;
        }

        tracing::debug!(
            actions = stats.actions,
            idle_waits = stats.idle_waits,
            pending = shared.queue.borrow().len(),
            "runloop stopped"
        );

        stats
    }
}

impl Default for Runloop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runloop {
    fn drop(&mut self) {
        // Pending actions may hold handles to this runloop; dropping them
        // outside the borrow breaks those cycles.
        let discarded = self.handle.shared.queue.borrow_mut().drain();

        if !discarded.is_empty() {
            tracing::debug!(count = discarded.len(), "runloop dropped with pending entries");
        }
    }
}
