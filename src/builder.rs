//! Fluent builder for Runloop construction.
//!
//! The only knob that changes runtime behaviour is the clock: the system
//! clock for real programs, a virtual clock for deterministic runs, or any
//! custom [`Clock`] implementation.

use crate::runtime::Runloop;
use crate::time::{Clock, SystemClock, VirtualClock};

/// Builder for constructing Runloop instances with fluent API.
///
/// # Example
/// ```ignore
/// let rt = RunloopBuilder::new().virtual_time().build();
/// ```
pub struct RunloopBuilder {
    clock: Option<Box<dyn Clock>>,
}

impl Default for RunloopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunloopBuilder {
    /// Creates a builder that defaults to the system clock.
    pub fn new() -> Self {
        Self { clock: None }
    }

    /// Uses `clock` for logical time and idle sleeps.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Uses a [`VirtualClock`] starting at the epoch.
    ///
    /// Idle waits advance logical time instantly instead of sleeping.
    pub fn virtual_time(self) -> Self {
        self.clock(VirtualClock::new())
    }

    /// Builds the runloop.
    ///
    /// # Example
    /// ```ignore
    /// let rt = RunloopBuilder::new().build();
    /// ```
    pub fn build(self) -> Runloop {
        let clock = self
            .clock
            .unwrap_or_else(|| Box::new(SystemClock::new()));

        Runloop::with_clock(clock)
    }
}
