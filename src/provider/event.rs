//! Host event queue.
//!
//! Each pull completes after a fixed interval with the oldest queued event,
//! or with the fallback event when nothing is queued.

use crate::promise::Promise;
use crate::provider::{self, Completion, Provider};
use crate::runtime::Handle;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Delay of one pull unless configured otherwise.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// Event delivered when the queue is empty unless configured otherwise.
pub const DEFAULT_EVENT: &str = "SomeEvent";

#[derive(Clone)]
pub struct EventSource {
    handle: Handle,
    interval: Duration,
    fallback: String,
    queued: Rc<RefCell<VecDeque<String>>>,
}

impl EventSource {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            interval: DEFAULT_INTERVAL,
            fallback: DEFAULT_EVENT.to_string(),
            queued: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn fallback(mut self, event: impl Into<String>) -> Self {
        self.fallback = event.into();
        self
    }

    /// Queues `event` for a later pull.
    pub fn push(&self, event: impl Into<String>) {
        self.queued.borrow_mut().push_back(event.into());
    }

    /// Events queued and not yet delivered.
    pub fn queued(&self) -> usize {
        self.queued.borrow().len()
    }

    /// Waits for the next event.
    pub fn pull(&self) -> Promise<String> {
        provider::request(self, ())
    }
}

impl Provider for EventSource {
    type Params = ();
    type Output = String;

    fn register(&self, _: (), on_complete: Completion<String>) {
        let source = self.clone();

        self.handle.post_after(self.interval, move || {
            // Events are taken at delivery time, so pushes made while the
            // pull was pending are still seen.
            let event = source.queued.borrow_mut().pop_front();
            let event = event.unwrap_or_else(|| source.fallback.clone());

            tracing::debug!(%event, "event delivered");
            on_complete.complete(event);
        });
    }
}

/// Waits for the next host event using a fresh source with default settings.
pub fn pull_event(handle: &Handle) -> Promise<String> {
    EventSource::new(handle.clone()).pull()
}
