//! Logical-time measurement for awaited work.
//!
//! [`Time`] wraps anything awaitable and measures the logical time from the
//! wrapper's creation until the wrapped value is ready.
//!
//! # Example
//!
//! ```ignore
//! use cooprt::time::{sleep, wrapper::Time};
//! use cooprt::Task;
//! use std::time::Duration;
//!
//! Task::spawn(async move {
//!     let nap = sleep(&handle, Duration::from_secs(1));
//!     let ((), elapsed) = Time::new(&handle, nap).await;
//!     assert_eq!(elapsed, Duration::from_secs(1));
//! });
//! ```

use crate::runtime::Handle;
use crate::time::Timestamp;

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// A future yielding `(output, elapsed)` for the wrapped awaitable.
pub struct Time<F: IntoFuture> {
    /// Logical time at which the wrapper was created.
    start: Timestamp,
    handle: Handle,
    inner: Pin<Box<F::IntoFuture>>,
}

impl<F: IntoFuture> Time<F> {
    /// Starts measuring `awaitable` on `handle`'s clock.
    pub fn new(handle: &Handle, awaitable: F) -> Self {
        Self {
            start: handle.now(),
            handle: handle.clone(),
            inner: Box::pin(awaitable.into_future()),
        }
    }
}

impl<F: IntoFuture> Future for Time<F> {
    type Output = (F::Output, Duration);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match this.inner.as_mut().poll(cx) {
            Poll::Ready(output) => {
                let elapsed = this.handle.now() - this.start;
                Poll::Ready((output, elapsed))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
