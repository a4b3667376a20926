//! Single-threaded cooperative runtime over callback-based deferred operations.
//!
//! Application code is written as ordinary sequential `async` blocks that
//! `.await` promises; the runtime turns those awaits into continuations on a
//! flat, time-ordered callback queue. Nothing ever runs in parallel: user code
//! and callbacks interleave only where a task awaits an incomplete promise.
//!
//! # Architecture
//!
//! - **Promise**: single-assignment value with ordered continuations; its
//!   [`Resolver`] is the only way to complete it
//! - **Task**: drives a future synchronously, suspends it on incomplete
//!   promises, and exposes its outcome through a [`JoinHandle`]
//! - **Runloop**: owns the time-ordered queue of deferred actions and the
//!   logical clock, and drives the process until the queue is empty
//! - **Providers**: timers, simulated requests and host events that complete
//!   through the runloop
//! - **RunloopBuilder**: fluent builder selecting the clock
//!
//! # Example
//!
//! ```ignore
//! use cooprt::{Runloop, Task};
//! use cooprt::provider::net::http_request;
//!
//! let rt = Runloop::builder().virtual_time().build();
//! let handle = rt.handle();
//!
//! let shared = http_request(&handle, "http://example.com/");
//! let first = Task::spawn({
//!     let shared = shared.clone();
//!     async move { shared.await }
//! });
//! let second = Task::spawn(async move { shared.await });
//!
//! rt.run();
//! assert!(first.is_finished() && second.is_finished());
//! ```

mod builder;
pub mod promise;
pub mod provider;
pub mod runtime;
pub mod task;
pub mod time;
mod utils;

pub use builder::RunloopBuilder;
pub use promise::{Promise, PromiseError, Resolver};
pub use runtime::{Handle, RunStats, Runloop, RuntimeError, yield_now};
pub use task::{JoinHandle, JoinSet, Task, TaskError, TaskState, join};
pub use time::{Clock, SystemClock, Timestamp, VirtualClock, sleep};
