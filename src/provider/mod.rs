//! Deferred-operation providers.
//!
//! A provider starts an operation and later reports its result through a
//! [`Completion`], which it must complete exactly once, no earlier than the
//! operation's due time, by posting through a runloop [`Handle`]. Failures are
//! results too: a provider reports them as values (for example
//! `Err(ProviderError)`) through the same completion.
//!
//! [`request`] turns any provider operation into a [`Promise`].
//!
//! - [`crate::time::Timer`]: completes after a delay
//! - [`net::SimulatedNetwork`]: fixed-latency HTTP-like requests
//! - [`event::EventSource`]: a queue of host events
//!
//! # Example
//!
//! ```ignore
//! use cooprt::provider::{self, net::SimulatedNetwork};
//!
//! let network = SimulatedNetwork::new(rt.handle());
//! let response = provider::request(&network, "http://example.com/".to_string());
//! ```
//!
//! [`Handle`]: crate::Handle

pub mod event;
pub mod net;

use crate::promise::Promise;

use thiserror::Error;

use std::fmt;

/// A result a provider could not produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },
}

/// One-shot completion callback handed to a provider.
///
/// [`Completion::complete`] consumes the completion, so a provider cannot
/// report twice.
pub struct Completion<T> {
    callback: Box<dyn FnOnce(T)>,
}

impl<T> Completion<T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(T) + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Delivers the operation's result.
    pub fn complete(self, value: T) {
        (self.callback)(value)
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// A host operation that completes asynchronously through a runloop.
pub trait Provider {
    /// What the operation needs to start.
    type Params;
    /// What the operation delivers on completion.
    type Output: 'static;

    /// Starts the operation. `on_complete` must be completed exactly once,
    /// from a runloop entry, never synchronously from inside this call.
    fn register(&self, params: Self::Params, on_complete: Completion<Self::Output>);
}

/// Starts `params` on `provider` and returns a promise for its result.
pub fn request<P>(provider: &P, params: P::Params) -> Promise<P::Output>
where
    P: Provider + ?Sized,
{
    Promise::new(|resolver| {
        provider.register(
            params,
            Completion::new(move |value| {
                if let Err(error) = resolver.resolve(value) {
                    tracing::error!(%error, "provider completed an already resolved promise");
                }
            }),
        );
    })
}
