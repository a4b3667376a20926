//! Waker implementation that resumes suspended tasks.
//!
//! Waking a task drives it synchronously: the continuation that fires the
//! waker runs inside [`Resolver::resolve`](crate::Resolver::resolve), so the
//! task has made its next step before `resolve` returns. That is what lets
//! several tasks awaiting one promise all proceed within a single resolution.

use crate::runtime::context;
use crate::utils::slab::Key;

use std::sync::Arc;
use std::task::{Wake, Waker};
use std::thread::{self, ThreadId};

/// Waker payload identifying one task on one thread.
pub(crate) struct TaskWaker {
    key: Key,
    owner: ThreadId,
}

impl TaskWaker {
    fn resume(&self) {
        if thread::current().id() != self.owner {
            tracing::warn!(
                owner = ?self.owner,
                "task woken from a foreign thread; wake ignored"
            );
            return;
        }

        match context::lookup(self.key) {
            Some(task) => task.drive(),
            None => tracing::trace!(key = ?self.key, "wake for a finished task ignored"),
        }
    }
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.resume();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.resume();
    }
}

/// Creates a waker that drives the task registered under `key` on this thread.
pub(crate) fn make_waker(key: Key) -> Waker {
    Waker::from(Arc::new(TaskWaker {
        key,
        owner: thread::current().id(),
    }))
}
