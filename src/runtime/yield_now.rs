use crate::promise::Promise;
use crate::runtime::Handle;

/// Cooperative scheduler hint: lets already-due entries run first.
///
/// Returns a promise resolved by an entry posted at the current logical time.
/// Awaiting it suspends the calling task until every entry that was already
/// due (including ones posted earlier at this same instant) has run.
///
/// # Example
/// ```ignore
/// Task::spawn(async move {
///     do_some_work();
///     yield_now(&handle).await;
///     do_more_work();
/// });
/// ```
pub fn yield_now(handle: &Handle) -> Promise<()> {
    Promise::new(|resolver| {
        handle.post(handle.now(), move || {
            if let Err(error) = resolver.resolve(()) {
                tracing::error!(%error, "yield entry resolved twice");
            }
        });
    })
}
