//! Runtime subsystem modules.

pub(crate) mod context;
mod core;
pub(crate) mod queue;
pub(crate) mod waker;
pub mod yield_now;

pub use context::live_tasks;
pub use self::core::{Handle, RunStats, Runloop, RuntimeError};
pub use queue::EntryId;
pub(crate) use waker::make_waker;
pub use yield_now::yield_now;
