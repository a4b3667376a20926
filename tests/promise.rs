mod common;

use cooprt::{Promise, PromiseError, Task};

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

#[test]
fn test_initializer_runs_synchronously() {
    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();

    let promise: Promise<i32> = Promise::new(move |_resolver| flag.set(true));

    assert!(ran.get(), "Initializer should run before new() returns");
    assert!(!promise.is_completed());
    assert_eq!(promise.peek(), None);
}

#[test]
fn test_initializer_may_resolve_immediately() {
    let promise = Promise::new(|resolver| {
        resolver.resolve(5).unwrap();
    });

    assert!(promise.is_completed());
    assert_eq!(promise.peek(), Some(5));
}

#[test]
fn test_ready_promise_is_completed() {
    let promise = Promise::ready("done");

    assert!(promise.is_completed());
    assert_eq!(promise.peek(), Some("done"));
    assert_eq!(promise.with_value(|value| value.len()), Some(4));
}

#[test]
fn test_double_resolution_keeps_first_value() {
    let (promise, resolver) = Promise::pending();
    let other = resolver.clone();

    assert_eq!(resolver.resolve(1), Ok(()));
    assert_eq!(resolver.resolve(2), Err(PromiseError::DoubleResolution));
    assert_eq!(other.resolve(3), Err(PromiseError::DoubleResolution));

    assert_eq!(promise.peek(), Some(1), "First value should be preserved");
    assert!(resolver.is_resolved());
}

#[test]
fn test_continuations_run_in_registration_order() {
    let (promise, resolver) = Promise::pending();
    let log = Rc::new(RefCell::new(Vec::new()));

    for i in 0..3 {
        let log = log.clone();
        promise
            .on_complete(move |value: &i32| log.borrow_mut().push(format!("{i}:{value}")))
            .unwrap();
    }

    assert_eq!(promise.waiters(), 3);
    assert!(log.borrow().is_empty(), "Nothing should run before resolution");

    resolver.resolve(7).unwrap();

    assert_eq!(*log.borrow(), vec!["0:7", "1:7", "2:7"]);
    assert_eq!(promise.waiters(), 0);
}

#[test]
fn test_continuations_fire_exactly_once() {
    let (promise, resolver) = Promise::pending();
    let calls = Rc::new(Cell::new(0));

    let counter = calls.clone();
    promise
        .on_complete(move |_: &u8| counter.set(counter.get() + 1))
        .unwrap();

    resolver.resolve(1).unwrap();
    let _ = resolver.resolve(2);

    assert_eq!(calls.get(), 1);
}

#[test]
fn test_on_complete_after_completion_is_protocol_violation() {
    let promise = Promise::ready(3);

    let result = promise.on_complete(|_| panic!("must not run"));

    assert_eq!(result, Err(PromiseError::ProtocolViolation));
}

#[test]
fn test_registering_on_same_promise_during_resolution_is_rejected() {
    let (promise, resolver) = Promise::pending();
    let outcome = Rc::new(RefCell::new(None));

    let observed = outcome.clone();
    let same = promise.clone();
    promise
        .on_complete(move |_: &i32| {
            *observed.borrow_mut() = Some(same.on_complete(|_| {}));
        })
        .unwrap();

    resolver.resolve(1).unwrap();

    assert_eq!(
        *outcome.borrow(),
        Some(Err(PromiseError::ProtocolViolation))
    );
}

#[test]
fn test_resolution_cascades_synchronously() {
    let (first, first_resolver) = Promise::pending();
    let (second, second_resolver) = Promise::pending();
    let log = Rc::new(RefCell::new(Vec::new()));

    first
        .on_complete(move |value: &i32| {
            second_resolver.resolve(value * 10).unwrap();
        })
        .unwrap();

    let sink = log.clone();
    second
        .on_complete(move |value: &i32| sink.borrow_mut().push(*value))
        .unwrap();

    first_resolver.resolve(4).unwrap();

    assert_eq!(*log.borrow(), vec![40]);
    assert_eq!(second.peek(), Some(40));
}

#[test]
fn test_observation_is_idempotent() {
    let (promise, resolver) = Promise::pending();
    promise.on_complete(|_: &String| {}).unwrap();

    for _ in 0..5 {
        assert!(!promise.is_completed());
        assert_eq!(promise.peek(), None);
        assert_eq!(promise.waiters(), 1);
    }

    resolver.resolve("value".to_string()).unwrap();

    for _ in 0..5 {
        assert!(promise.is_completed());
        assert_eq!(promise.peek().as_deref(), Some("value"));
        assert_eq!(promise.waiters(), 0);
    }
}

#[test]
fn test_clones_share_state() {
    let (promise, resolver) = Promise::pending();
    let clone = promise.clone();

    assert!(clone.ptr_eq(&promise));
    assert!(resolver.promise().ptr_eq(&promise));

    resolver.resolve(9).unwrap();

    assert_eq!(clone.peek(), Some(9));
}

#[test]
fn test_panicking_continuation_does_not_skip_later_ones() {
    let (promise, resolver) = Promise::<i32>::pending();
    let seen = Rc::new(Cell::new(None));

    promise
        .on_complete(|_| panic!("continuation failed"))
        .unwrap();

    let sink = seen.clone();
    promise
        .on_complete(move |value: &i32| sink.set(Some(*value)))
        .unwrap();

    let waiter = Task::spawn({
        let promise = promise.clone();
        async move { promise.await + 1 }
    });

    let outcome = catch_unwind(AssertUnwindSafe(|| resolver.resolve(3)));

    assert!(outcome.is_err(), "The continuation's panic should reach the resolver");
    assert_eq!(seen.get(), Some(3), "Later continuations should still run");
    assert_eq!(waiter.peek(), Some(Ok(4)), "Awaiting tasks should still resume");
    assert!(promise.is_completed());
}

#[test]
fn test_last_resolver_drop_discards_continuations() {
    let (promise, resolver) = Promise::<i32>::pending();
    let marker = Rc::new(());

    let held = marker.clone();
    promise
        .on_complete(move |_| drop(held))
        .unwrap();
    assert_eq!(Rc::strong_count(&marker), 2);

    let spare = resolver.clone();
    drop(resolver);
    assert_eq!(promise.waiters(), 1, "A clone should keep the promise resolvable");

    drop(spare);

    assert_eq!(promise.waiters(), 0);
    assert_eq!(Rc::strong_count(&marker), 1, "Continuations should be dropped");
    assert!(!promise.is_completed());

    // Nothing can complete it any more, so new registrations are not kept.
    promise.on_complete(|_| {}).unwrap();
    assert_eq!(promise.waiters(), 0);
}
