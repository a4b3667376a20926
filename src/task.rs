//! Tasks: user computations that suspend on promises.
//!
//! A task wraps a future and drives it on the current thread. The driver is a
//! plain resume loop with no queue of its own:
//!
//! 1. [`Task::spawn`] polls the future immediately.
//! 2. If the future awaits an incomplete [`Promise`], the awaited promise
//!    receives a continuation that wakes this task, and `spawn` returns.
//! 3. When that promise resolves, the continuation drives the task again,
//!    synchronously, with the value now available at the `.await` site.
//! 4. When the future returns, the task's output promise resolves with
//!    `Ok(value)`. A panic instead resolves it with `Err(TaskError)`.
//!
//! A suspended task is kept alive by the promise it awaits. If every
//! [`Resolver`](crate::Resolver) of that promise is dropped first, the task can
//! never resume: it is dropped along with its future, and its output promise
//! never completes.
//!
//! # Task Spawning
//!
//! ```ignore
//! use cooprt::{Runloop, Task};
//! use cooprt::time::sleep;
//! use std::time::Duration;
//!
//! let rt = Runloop::new();
//! let handle = rt.handle();
//!
//! let task = Task::spawn(async move {
//!     sleep(&handle, Duration::from_secs(1)).await;
//!     42
//! });
//!
//! rt.run();
//! assert_eq!(task.peek(), Some(Ok(42)));
//! ```
//!
//! # Join Handles
//!
//! [`Task::spawn`] returns a [`JoinHandle`]. Awaiting it from another task
//! yields the outcome as `Result<T, TaskError>`. Any number of tasks may await
//! the same handle.
//!
//! # Joining Several Tasks
//!
//! [`join`] awaits a list of futures in order and preserves their order in the
//! result, whatever order they complete in. [`JoinSet`] does the same for
//! handles collected incrementally.

use crate::promise::{Promise, Wait};
use crate::runtime::{context, make_waker};
use crate::utils::slab::Key;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use thiserror::Error;

use std::any::Any;
use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, Waker};

/// Process-wide unique task identifier, used in logs and errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Execution status of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    NotStarted,
    Running,
    /// Waiting for a promise to resolve.
    Suspended,
    Completed,
    Failed,
}

impl TaskState {
    /// Returns whether the task can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// A fault raised by a task body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task {task} panicked: {message}")]
    Panicked { task: TaskId, message: String },
}

impl TaskError {
    fn from_panic(task: TaskId, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };

        TaskError::Panicked { task, message }
    }

    /// The task that raised the fault.
    pub fn task(&self) -> TaskId {
        match self {
            TaskError::Panicked { task, .. } => *task,
        }
    }
}

/// Entry point for spawning tasks.
pub struct Task;

impl Task {
    /// Spawns `future` as a task and starts driving it immediately.
    ///
    /// Returns once the future has either completed or suspended on its first
    /// incomplete promise. Spawning does not require a runloop; only the
    /// providers the task awaits do.
    ///
    /// # Example
    /// ```ignore
    /// let handle = Task::spawn(async { 1 + 1 });
    /// assert_eq!(handle.peek(), Some(Ok(2)));
    /// ```
    pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        Self::spawn_inner(future, false)
    }

    /// Spawns a task whose caller inspects the outcome itself, so a fault is
    /// not reported as unobserved.
    pub(crate) fn spawn_observed<F>(future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        Self::spawn_inner(future, true)
    }

    fn spawn_inner<F>(future: F, observed: bool) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let id = TaskId::next();
        let state = Rc::new(Cell::new(TaskState::NotStarted));
        let (output, resolver) = Promise::pending();

        let body_state = state.clone();
        let body = async move {
            let outcome = AssertUnwindSafe(future).catch_unwind().await;

            let result = match outcome {
                Ok(value) => {
                    body_state.set(TaskState::Completed);
                    tracing::trace!(task = %id, "task completed");
                    Ok(value)
                }
                Err(payload) => {
                    body_state.set(TaskState::Failed);
                    let error = TaskError::from_panic(id, payload);

                    if !observed && resolver.waiters() == 0 {
                        tracing::error!(task = %id, %error, "task failed and nobody is awaiting it");
                    } else {
                        tracing::debug!(task = %id, %error, "task failed");
                    }

                    Err(error)
                }
            };

            if let Err(error) = resolver.resolve(result) {
                tracing::error!(task = %id, %error, "task output resolved twice");
            }
        }
        .boxed_local();

        let cell = Rc::new(TaskCell {
            id,
            state: state.clone(),
            future: RefCell::new(Some(body)),
            notified: Cell::new(false),
            key: Cell::new(None),
            waker: OnceCell::new(),
        });

        let key = context::register(&cell);
        cell.key.set(Some(key));
        let _ = cell.waker.set(make_waker(key));

        tracing::trace!(task = %id, "task spawned");
        cell.drive();

        JoinHandle { id, state, output }
    }
}

/// The driver state of one spawned task.
pub(crate) struct TaskCell {
    id: TaskId,
    state: Rc<Cell<TaskState>>,
    future: RefCell<Option<LocalBoxFuture<'static, ()>>>,
    /// Set when a wake arrives while the task is being polled.
    notified: Cell<bool>,
    key: Cell<Option<Key>>,
    waker: OnceCell<Waker>,
}

impl TaskCell {
    /// Runs the resume loop until the task suspends or finishes.
    pub(crate) fn drive(self: &Rc<Self>) {
        loop {
            let taken = self.future.borrow_mut().take();

            let Some(mut future) = taken else {
                if self.state.get() == TaskState::Running {
                    self.notified.set(true);
                } else {
                    tracing::trace!(task = %self.id, "stale wake ignored");
                }
                return;
            };

            let Some(waker) = self.waker.get() else {
                *self.future.borrow_mut() = Some(future);
                return;
            };

            self.state.set(TaskState::Running);
            let mut cx = Context::from_waker(waker);

            let poll = {
                let _entered = context::enter(self.clone());
                future.as_mut().poll(&mut cx)
            };

            match poll {
                Poll::Ready(()) => {
                    drop(future);

                    if let Some(key) = self.key.take() {
                        context::deregister(key);
                    }
                    return;
                }
                Poll::Pending => {
                    self.state.set(TaskState::Suspended);
                    *self.future.borrow_mut() = Some(future);

                    if !self.notified.replace(false) {
                        tracing::trace!(task = %self.id, "task suspended");
                        return;
                    }
                }
            }
        }
    }
}

impl Drop for TaskCell {
    fn drop(&mut self) {
        // Only reached with a key when the task was abandoned: nothing can
        // resolve the promise it was suspended on.
        if let Some(key) = self.key.take() {
            tracing::debug!(task = %self.id, "abandoned task dropped");
            context::deregister(key);
        }
    }
}

/// Handle to a spawned task's outcome.
///
/// Awaiting a handle yields `Result<T, TaskError>`. Handles can be cloned and
/// awaited by several tasks at once.
pub struct JoinHandle<T> {
    id: TaskId,
    state: Rc<Cell<TaskState>>,
    output: Promise<Result<T, TaskError>>,
}

impl<T: 'static> JoinHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state.get()
    }

    /// Returns whether the task has completed or failed.
    pub fn is_finished(&self) -> bool {
        self.output.is_completed()
    }

    /// Returns the outcome if the task has finished.
    pub fn peek(&self) -> Option<Result<T, TaskError>>
    where
        T: Clone,
    {
        self.output.peek()
    }

    /// The promise carrying the task's outcome.
    pub fn promise(&self) -> &Promise<Result<T, TaskError>> {
        &self.output
    }

    pub fn into_promise(self) -> Promise<Result<T, TaskError>> {
        self.output
    }
}

impl<T> Clone for JoinHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            state: self.state.clone(),
            output: self.output.clone(),
        }
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .finish()
    }
}

impl<T: Clone + 'static> IntoFuture for JoinHandle<T> {
    type Output = Result<T, TaskError>;
    type IntoFuture = Wait<Result<T, TaskError>>;

    fn into_future(self) -> Self::IntoFuture {
        self.output.into_future()
    }
}

impl<T: Clone + 'static> IntoFuture for &JoinHandle<T> {
    type Output = Result<T, TaskError>;
    type IntoFuture = Wait<Result<T, TaskError>>;

    fn into_future(self) -> Self::IntoFuture {
        self.output.wait()
    }
}

/// Spawns a task that awaits every input in order and collects the outputs.
///
/// The result preserves input order regardless of completion order, and the
/// task finishes once the slowest input has finished.
///
/// # Example
/// ```ignore
/// let all = join(vec![sleep(&h, one_sec), sleep(&h, two_secs)]);
/// rt.run();
/// assert!(all.is_finished());
/// ```
pub fn join<I, F>(futures: I) -> JoinHandle<Vec<F::Output>>
where
    I: IntoIterator<Item = F>,
    F: IntoFuture + 'static,
    F::IntoFuture: 'static,
    F::Output: 'static,
{
    let futures: Vec<F> = futures.into_iter().collect();

    Task::spawn(async move {
        let mut results = Vec::with_capacity(futures.len());
        for future in futures {
            results.push(future.await);
        }
        results
    })
}

/// A helper to collect [`JoinHandle`]s and await all of them at once.
///
/// # Example
/// ```ignore
/// let mut set = JoinSet::new();
///
/// for i in 0..5 {
///     set.push(Task::spawn(async move { i }));
/// }
///
/// let outcomes = set.await_all().await;
/// ```
pub struct JoinSet<T> {
    handles: Vec<JoinHandle<T>>,
}

impl<T: Clone + 'static> JoinSet<T> {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    pub fn push(&mut self, handle: JoinHandle<T>) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Awaits every handle in push order, draining the set.
    pub async fn await_all(&mut self) -> Vec<Result<T, TaskError>> {
        let mut outcomes = Vec::with_capacity(self.handles.len());
        for handle in self.handles.drain(..) {
            outcomes.push(handle.await);
        }
        outcomes
    }
}

impl<T: Clone + 'static> Default for JoinSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
