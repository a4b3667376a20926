//! Thread-local registry of live tasks.
//!
//! Wakers must be `Send + Sync`, but tasks are `Rc`-based and never leave the
//! thread that spawned them. A waker therefore carries only a slab [`Key`]
//! and the owning thread's id, and resolves the key back to the task through
//! this registry when it fires.
//!
//! The registry only holds weak references. A suspended task is owned by the
//! continuation it registered on the promise it awaits, so once that promise
//! can no longer complete the task is dropped together with everything it
//! captured. Keys are generational, so a wake that arrives after the task
//! finished finds nothing and is ignored.

use crate::task::TaskCell;
use crate::utils::slab::{Key, Slab};

use std::cell::RefCell;
use std::rc::{Rc, Weak};

thread_local! {
    /// Live tasks spawned on this thread.
    static TASKS: RefCell<Slab<Weak<TaskCell>>> = const { RefCell::new(Slab::new()) };

    /// Tasks being polled on this thread, innermost last.
    static CURRENT: RefCell<Vec<Rc<TaskCell>>> = const { RefCell::new(Vec::new()) };
}

/// Adds a task to this thread's registry.
pub(crate) fn register(task: &Rc<TaskCell>) -> Key {
    TASKS.with(|tasks| tasks.borrow_mut().insert(Rc::downgrade(task)))
}

/// Returns the live task behind `key`, if any.
///
/// The registry borrow is released before returning, so the caller may drive
/// the task (which may spawn or finish other tasks) freely.
pub(crate) fn lookup(key: Key) -> Option<Rc<TaskCell>> {
    TASKS
        .try_with(|tasks| tasks.borrow().get(key).and_then(Weak::upgrade))
        .ok()
        .flatten()
}

/// Removes a finished or dropped task from the registry.
pub(crate) fn deregister(key: Key) {
    let _ = TASKS.try_with(|tasks| tasks.borrow_mut().remove(key));
}

/// Number of tasks on this thread that are still alive and unfinished.
pub fn live_tasks() -> usize {
    TASKS.with(|tasks| tasks.borrow().len())
}

/// Marks `task` as the one being polled until the guard is dropped.
pub(crate) fn enter(task: Rc<TaskCell>) -> Entered {
    CURRENT.with(|current| current.borrow_mut().push(task));
    Entered { _private: () }
}

/// The task currently being polled on this thread.
pub(crate) fn current_task() -> Option<Rc<TaskCell>> {
    CURRENT
        .try_with(|current| current.borrow().last().cloned())
        .ok()
        .flatten()
}

pub(crate) struct Entered {
    _private: (),
}

impl Drop for Entered {
    fn drop(&mut self) {
        let task = CURRENT
            .try_with(|current| current.borrow_mut().pop())
            .ok()
            .flatten();
        drop(task);
    }
}
