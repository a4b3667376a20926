use crate::promise::Promise;
use crate::provider::{self, Completion, Provider};
use crate::runtime::Handle;

use std::time::Duration;

/// Provider that completes after a delay.
#[derive(Clone, Debug)]
pub struct Timer {
    handle: Handle,
}

impl Timer {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Provider for Timer {
    type Params = Duration;
    type Output = ();

    fn register(&self, delay: Duration, on_complete: Completion<()>) {
        self.handle
            .post_after(delay, move || on_complete.complete(()));
    }
}

/// Returns a promise that resolves `delay` after the current logical time.
///
/// A zero delay still completes through the runloop, after every entry that
/// is already due.
///
/// # Example
/// ```ignore
/// use cooprt::time::sleep;
/// use std::time::Duration;
///
/// Task::spawn(async move {
///     sleep(&handle, Duration::from_millis(100)).await;
///     println!("Woke up after 100ms");
/// });
/// ```
pub fn sleep(handle: &Handle, delay: Duration) -> Promise<()> {
    provider::request(&Timer::new(handle.clone()), delay)
}
