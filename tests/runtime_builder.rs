mod common;

use common::{RecordingClock, secs};
use cooprt::{Promise, Runloop, RunloopBuilder, RuntimeError, Task, TaskError, Timestamp, sleep};

use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

#[test]
fn test_builder_creation() {
    let rt = RunloopBuilder::new().build();
    drop(rt);
}

#[test]
fn test_builder_simple_future() {
    let rt = RunloopBuilder::new().virtual_time().build();
    let completed = Rc::new(Cell::new(false));
    let completed_clone = completed.clone();

    let future = async move {
        completed_clone.set(true);
    };

    assert_eq!(rt.block_on(future), Ok(()));
    assert!(completed.get(), "Future should have completed");
}

#[test]
fn test_builder_immediate_result() {
    let rt = RunloopBuilder::new().build();
    let value = 42;

    let result = rt.block_on(async move { value });

    assert_eq!(result, Ok(42), "Future should return correct value");
}

#[test]
fn test_builder_multiple_instances() {
    let rt1 = RunloopBuilder::new().virtual_time().build();
    let rt2 = RunloopBuilder::new().virtual_time().build();

    let result1 = rt1.block_on(async { 10 });
    let result2 = rt2.block_on(async { 20 });

    assert_eq!(result1, Ok(10));
    assert_eq!(result2, Ok(20));
}

#[test]
fn test_builder_with_custom_clock() {
    let clock = RecordingClock::new();
    let rt = RunloopBuilder::new().clock(clock.clone()).build();
    let handle = rt.handle();

    let result = rt.block_on(async move {
        sleep(&handle, secs(2)).await;
        handle.now()
    });

    assert_eq!(result, Ok(Timestamp::from_secs(2)));
    assert_eq!(clock.sleeps(), vec![secs(2)], "Idle time should go through the clock");
}

#[test]
fn test_builder_with_async_function() {
    let rt = RunloopBuilder::new().virtual_time().build();
    let counter = Rc::new(RefCell::new(0));

    async fn increment_counter(counter: Rc<RefCell<i32>>) -> i32 {
        let mut val = counter.borrow_mut();
        *val += 1;
        *val
    }

    let result = rt.block_on(increment_counter(counter.clone()));

    assert_eq!(result, Ok(1), "Counter should be incremented");
    assert_eq!(*counter.borrow(), 1, "Shared counter should be 1");
}

#[test]
fn test_block_on_reports_stalled_task() {
    let rt = RunloopBuilder::new().virtual_time().build();
    let (never, _resolver) = Promise::<u8>::pending();

    let result = rt.block_on(async move { never.await });

    assert!(
        matches!(result, Err(RuntimeError::Stalled { .. })),
        "A task nothing will resume should be reported as stalled: {result:?}"
    );
}

#[test]
fn test_block_on_reports_panicking_task() {
    let rt = RunloopBuilder::new().virtual_time().build();
    let handle = rt.handle();

    let result = rt.block_on(async move {
        sleep(&handle, secs(1)).await;
        if handle.now() > Timestamp::ZERO {
            panic!("failed after sleeping");
        }
    });

    match result {
        Err(RuntimeError::Task(TaskError::Panicked { message, .. })) => {
            assert_eq!(message, "failed after sleeping");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_spawn_multiple_tasks() {
    let rt = Runloop::builder().virtual_time().build();
    let handle = rt.handle();
    let counter = Rc::new(Cell::new(0));

    for i in 1..=5 {
        let counter = counter.clone();
        let handle = handle.clone();
        rt.spawn(async move {
            sleep(&handle, secs(i)).await;
            counter.set(counter.get() + 1);
        });
    }

    assert_eq!(counter.get(), 0, "Every task should be suspended on its sleep");

    rt.run();

    assert_eq!(counter.get(), 5, "All 5 tasks should have run");
    assert_eq!(rt.now(), Timestamp::from_secs(5));
}

#[test]
fn test_block_on_waits_for_spawned_tasks() {
    let rt = Runloop::builder().virtual_time().build();
    let handle = rt.handle();
    let executed = Rc::new(Cell::new(false));

    let background = rt.spawn({
        let executed = executed.clone();
        let handle = handle.clone();
        async move {
            sleep(&handle, secs(3)).await;
            executed.set(true);
        }
    });

    assert_eq!(rt.block_on(async {}), Ok(()));

    assert!(
        executed.get(),
        "Spawned task should execute before block_on returns"
    );
    assert!(background.is_finished());
    assert!(Task::spawn(async {}).is_finished());
}

/// Log sink shared between a subscriber and the test.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

async fn fail(message: &'static str) {
    panic!("{message}");
}

#[test]
fn test_block_on_fault_is_not_reported_as_unobserved() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let rt = RunloopBuilder::new().virtual_time().build();

        let result = rt.block_on(fail("observed"));
        assert!(matches!(result, Err(RuntimeError::Task(_))));

        let detached = Task::spawn(fail("detached"));
        assert!(detached.is_finished());
    });

    let output = logs.contents();
    assert_eq!(
        output.matches("nobody is awaiting it").count(),
        1,
        "Only the detached task's fault should be reported as unobserved:\n{output}"
    );
    assert!(output.contains("detached"));
}
