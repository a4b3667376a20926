//! Single-assignment values that become available later.
//!
//! A [`Promise`] is the observable half: anyone holding it can check whether
//! it has completed, peek at the value, register continuations, or `.await`
//! it from inside a task. The [`Resolver`] is the capability to complete it
//! and is only handed to the code that created the promise.
//!
//! # Lifecycle
//!
//! 1. [`Promise::new`] runs the initializer synchronously with a resolver
//! 2. The initializer resolves right away or passes the resolver to a provider
//! 3. [`Resolver::resolve`] stores the value exactly once
//! 4. Every continuation registered so far runs, in registration order,
//!    before `resolve` returns
//!
//! # Example
//!
//! ```ignore
//! use cooprt::Promise;
//!
//! let (promise, resolver) = Promise::pending();
//! promise.on_complete(|value| println!("got {value}"))?;
//!
//! resolver.resolve(7)?;
//! assert_eq!(promise.peek(), Some(7));
//! ```
//!
//! # Awaiting
//!
//! Inside a task, `promise.await` returns the value immediately when the
//! promise has already completed. Otherwise the task suspends and a single
//! continuation is registered that resumes it when the value arrives.
//!
//! ```ignore
//! use cooprt::{Promise, Task};
//!
//! let (promise, resolver) = Promise::pending();
//! let waiter = Task::spawn(async move { promise.await * 2 });
//!
//! resolver.resolve(21)?;
//! assert_eq!(waiter.peek(), Some(Ok(42)));
//! ```
//!
//! # Abandonment
//!
//! When the last resolver is dropped without resolving, the promise can never
//! complete. Its continuations are dropped without running, which also drops
//! any task that was suspended on it.

use crate::runtime::context;

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use thiserror::Error;

/// Misuse of the promise protocol.
///
/// Both variants are programming errors. They are reported at the point of
/// misuse and never change the promise's state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromiseError {
    /// The promise was resolved a second time. The first value is kept.
    #[error("promise already resolved")]
    DoubleResolution,

    /// A continuation was registered on a promise that had already completed.
    #[error("continuation registered after the promise completed")]
    ProtocolViolation,
}

type Continuation<T> = Box<dyn FnOnce(&T)>;

struct Inner<T> {
    value: OnceCell<T>,
    continuations: RefCell<Vec<Continuation<T>>>,
    /// Live resolver handles.
    resolvers: Cell<usize>,
}

impl<T> Inner<T> {
    fn is_abandoned(&self) -> bool {
        self.resolvers.get() == 0 && self.value.get().is_none()
    }

    /// Stores `continuation` unless the promise can no longer complete.
    fn register(&self, continuation: Continuation<T>) {
        if self.is_abandoned() {
            return;
        }

        self.continuations.borrow_mut().push(continuation);
    }
}

/// A single-assignment container for a value that will exist later.
///
/// Cloning a promise is cheap and yields another handle to the same value.
pub struct Promise<T> {
    inner: Rc<Inner<T>>,
}

/// The capability to complete a [`Promise`].
///
/// Cloning gives another handle to the same capability. Only the first
/// successful [`Resolver::resolve`] across all clones takes effect.
pub struct Resolver<T> {
    inner: Rc<Inner<T>>,
}

impl<T: 'static> Promise<T> {
    /// Creates a promise and hands its resolver to `initializer`.
    ///
    /// The initializer runs before this function returns. It may resolve the
    /// promise immediately or keep the resolver for later.
    pub fn new<F>(initializer: F) -> Self
    where
        F: FnOnce(Resolver<T>),
    {
        let (promise, resolver) = Self::pending();
        initializer(resolver);
        promise
    }

    /// Creates an incomplete promise together with its resolver.
    pub fn pending() -> (Self, Resolver<T>) {
        let inner = Rc::new(Inner {
            value: OnceCell::new(),
            continuations: RefCell::new(Vec::new()),
            resolvers: Cell::new(1),
        });

        (
            Self {
                inner: inner.clone(),
            },
            Resolver { inner },
        )
    }

    /// Creates a promise that has already completed with `value`.
    pub fn ready(value: T) -> Self {
        let (promise, _) = Self::pending();
        let _ = promise.inner.value.set(value);
        promise
    }

    /// Returns whether the value has been set.
    pub fn is_completed(&self) -> bool {
        self.inner.value.get().is_some()
    }

    /// Returns a clone of the value, or `None` while the promise is pending.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.inner.value.get().cloned()
    }

    /// Runs `inspect` on the value without cloning it, if the promise has completed.
    pub fn with_value<R>(&self, inspect: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.value.get().map(inspect)
    }

    /// Registers `continuation` to run when the promise completes.
    ///
    /// # Errors
    /// Returns [`PromiseError::ProtocolViolation`] if the promise has already
    /// completed. The continuation is dropped without running.
    pub fn on_complete<F>(&self, continuation: F) -> Result<(), PromiseError>
    where
        F: FnOnce(&T) + 'static,
    {
        if self.is_completed() {
            return Err(PromiseError::ProtocolViolation);
        }

        self.inner.register(Box::new(continuation));

        Ok(())
    }

    /// Number of continuations waiting for the value.
    ///
    /// Always zero once the promise has completed.
    pub fn waiters(&self) -> usize {
        self.inner.continuations.borrow().len()
    }

    /// Returns a future that resolves to a clone of the value.
    pub fn wait(&self) -> Wait<T>
    where
        T: Clone,
    {
        Wait {
            promise: self.clone(),
            waker: None,
        }
    }

    /// Returns whether both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> Resolver<T> {
    /// Completes the promise and runs its continuations in registration order.
    ///
    /// A panicking continuation does not stop the ones after it. Once all of
    /// them have run, the first panic is resumed in the caller.
    ///
    /// # Errors
    /// Returns [`PromiseError::DoubleResolution`] if the promise has already
    /// completed. The stored value is left untouched.
    pub fn resolve(&self, value: T) -> Result<(), PromiseError> {
        if self.inner.value.set(value).is_err() {
            return Err(PromiseError::DoubleResolution);
        }

        // Continuations may register on other promises, resolve them, or
        // resume tasks; none of that may hold a borrow of this list.
        let continuations = std::mem::take(&mut *self.inner.continuations.borrow_mut());

        let Some(value) = self.inner.value.get() else {
            return Ok(());
        };

        let mut fault = None;
        for continuation in continuations {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| continuation(value))) {
                fault.get_or_insert(payload);
            }
        }

        if let Some(payload) = fault {
            panic::resume_unwind(payload);
        }

        Ok(())
    }

    /// Returns whether the promise has already been resolved.
    pub fn is_resolved(&self) -> bool {
        self.inner.value.get().is_some()
    }

    /// Number of continuations that will run on resolution.
    pub fn waiters(&self) -> usize {
        self.inner.continuations.borrow().len()
    }

    /// Returns an observer handle for the promise this resolver completes.
    pub fn promise(&self) -> Promise<T> {
        Promise {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        self.inner.resolvers.set(self.inner.resolvers.get() + 1);

        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        let remaining = self.inner.resolvers.get().saturating_sub(1);
        self.inner.resolvers.set(remaining);

        if remaining == 0 && self.inner.value.get().is_none() {
            // Dropped outside the borrow: they may own suspended tasks whose
            // futures hold other promises.
            let abandoned = std::mem::take(&mut *self.inner.continuations.borrow_mut());

            if !abandoned.is_empty() {
                tracing::debug!(
                    waiters = abandoned.len(),
                    "promise abandoned before resolution"
                );
            }
            drop(abandoned);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.value.get() {
            Some(value) => f.debug_tuple("Promise::Completed").field(value).finish(),
            None => f
                .debug_struct("Promise::Pending")
                .field("waiters", &self.inner.continuations.borrow().len())
                .finish(),
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("resolved", &self.inner.value.get().is_some())
            .finish()
    }
}

/// Future returned by [`Promise::wait`] and by `.await` on a promise.
///
/// The first pending poll registers one continuation on the promise. Later
/// polls only refresh the waker that continuation will use, so a suspended
/// task is resumed exactly once per resolution.
pub struct Wait<T> {
    promise: Promise<T>,
    waker: Option<Rc<RefCell<Waker>>>,
}

impl<T: Clone + 'static> Future for Wait<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(value) = this.promise.peek() {
            return Poll::Ready(value);
        }

        match &this.waker {
            Some(slot) => {
                let mut current = slot.borrow_mut();
                if !current.will_wake(cx.waker()) {
                    *current = cx.waker().clone();
                }
            }
            None => {
                let slot = Rc::new(RefCell::new(cx.waker().clone()));
                let continuation_slot = slot.clone();

                // The awaiting task is owned by this continuation while it is
                // suspended.
                let owner = context::current_task();

                this.promise.inner.register(Box::new(move |_: &T| {
                    let waker = continuation_slot.borrow().clone();
                    waker.wake();
                    drop(owner);
                }));

                this.waker = Some(slot);
            }
        }

        Poll::Pending
    }
}

impl<T: Clone + 'static> IntoFuture for Promise<T> {
    type Output = T;
    type IntoFuture = Wait<T>;

    fn into_future(self) -> Self::IntoFuture {
        Wait {
            promise: self,
            waker: None,
        }
    }
}

impl<T: Clone + 'static> IntoFuture for &Promise<T> {
    type Output = T;
    type IntoFuture = Wait<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait()
    }
}
