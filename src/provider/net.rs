//! Simulated network requests.
//!
//! Every request takes the same configured latency and then yields either the
//! canned body for its URL or a configured failure. Failures arrive as
//! `Err(ProviderError)` through the normal completion path.

use crate::promise::Promise;
use crate::provider::{self, Completion, Provider, ProviderError};
use crate::runtime::Handle;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

/// Latency of a simulated request unless configured otherwise.
pub const DEFAULT_LATENCY: Duration = Duration::from_secs(5);

/// Response body of a simulated request unless configured otherwise.
pub const DEFAULT_BODY: &str = "result";

/// Result of one simulated request.
pub type Response = Result<String, ProviderError>;

#[derive(Default)]
struct Routes {
    bodies: HashMap<String, String>,
    failures: HashMap<String, String>,
}

/// An HTTP-like provider backed by the runloop.
///
/// # Example
/// ```ignore
/// let network = SimulatedNetwork::new(rt.handle())
///     .latency(Duration::from_secs(1))
///     .route("http://example.com/a", "alpha")
///     .fail("http://example.com/down", "connection refused");
///
/// let response = network.get("http://example.com/a");
/// ```
#[derive(Clone)]
pub struct SimulatedNetwork {
    handle: Handle,
    latency: Duration,
    body: String,
    routes: Rc<RefCell<Routes>>,
}

impl SimulatedNetwork {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            latency: DEFAULT_LATENCY,
            body: DEFAULT_BODY.to_string(),
            routes: Rc::new(RefCell::new(Routes::default())),
        }
    }

    /// Sets how long every request takes.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Sets the body returned for URLs without a route.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns `body` for requests to `url`.
    pub fn route(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.routes
            .borrow_mut()
            .bodies
            .insert(url.into(), body.into());
        self
    }

    /// Makes requests to `url` fail with `reason`.
    pub fn fail(self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        self.routes
            .borrow_mut()
            .failures
            .insert(url.into(), reason.into());
        self
    }

    /// Starts a request to `url`.
    pub fn get(&self, url: impl Into<String>) -> Promise<Response> {
        provider::request(self, url.into())
    }

    fn respond(&self, url: &str) -> Response {
        let routes = self.routes.borrow();

        if let Some(reason) = routes.failures.get(url) {
            return Err(ProviderError::RequestFailed {
                url: url.to_string(),
                reason: reason.clone(),
            });
        }

        Ok(routes
            .bodies
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.body.clone()))
    }
}

impl Provider for SimulatedNetwork {
    type Params = String;
    type Output = Response;

    fn register(&self, url: String, on_complete: Completion<Response>) {
        tracing::info!(%url, latency = ?self.latency, "making request");

        let network = self.clone();
        self.handle.post_after(self.latency, move || {
            let response = network.respond(&url);

            match &response {
                Ok(_) => tracing::info!(%url, "completed request"),
                Err(error) => tracing::warn!(%url, %error, "request failed"),
            }

            on_complete.complete(response);
        });
    }
}

/// Makes a request to `url` with the default latency and body.
pub fn http_request(handle: &Handle, url: impl Into<String>) -> Promise<Response> {
    SimulatedNetwork::new(handle.clone()).get(url)
}
