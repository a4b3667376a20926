mod common;

use common::init_test_logging;
use cooprt::time::{Clock, VirtualClock};
use cooprt::{Runloop, Timestamp, sleep};

use std::time::{Duration, Instant};

#[test]
fn test_sleep_basic() {
    init_test_logging();
    let rt = Runloop::new();
    let handle = rt.handle();

    let start = Instant::now();
    rt.block_on(async move {
        sleep(&handle, Duration::from_millis(50)).await;
    })
    .unwrap();
    let elapsed = start.elapsed();

    assert!(
        elapsed >= Duration::from_millis(50),
        "Sleep should wait at least the specified duration"
    );
}

#[test]
fn test_sleep_zero_duration() {
    init_test_logging();
    let rt = Runloop::new();
    let handle = rt.handle();

    let start = Instant::now();
    let stats = rt.run_until(Timestamp::ZERO);
    assert_eq!(stats.actions, 0);

    rt.block_on(async move {
        sleep(&handle, Duration::ZERO).await;
    })
    .unwrap();
    let elapsed = start.elapsed();

    // Should complete almost immediately
    assert!(
        elapsed < Duration::from_millis(10),
        "Zero duration sleep should be fast"
    );
}

#[test]
fn test_sleep_in_function() {
    init_test_logging();
    let rt = Runloop::new();
    let handle = rt.handle();

    rt.block_on(sleep_and_record(handle)).unwrap();
}

async fn sleep_and_record(handle: cooprt::Handle) {
    let before = handle.now();
    sleep(&handle, Duration::from_millis(30)).await;
    let after = handle.now();

    assert!(after - before >= Duration::from_millis(30));
}

#[test]
fn test_virtual_sleep_does_not_block() {
    init_test_logging();
    let rt = Runloop::builder().virtual_time().build();
    let handle = rt.handle();

    let start = Instant::now();
    let woke_at = rt
        .block_on(async move {
            sleep(&handle, Duration::from_secs(3600)).await;
            handle.now()
        })
        .unwrap();

    assert_eq!(woke_at, Timestamp::from_secs(3600));
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "Virtual time should not really sleep"
    );
}

#[test]
fn test_virtual_clock_only_moves_forward() {
    let clock = VirtualClock::starting_at(Timestamp::from_secs(10));

    clock.advance_to(Timestamp::from_secs(4));
    assert_eq!(clock.now(), Timestamp::from_secs(10));

    clock.sleep(Duration::from_millis(250));
    assert_eq!(clock.now(), Timestamp::from_millis(10_250));
    assert_eq!(clock.now().to_string(), "10.250s");
}

#[test]
fn test_timestamp_from_fractional_seconds() {
    assert_eq!(
        Timestamp::try_from_secs_f64(1.5),
        Ok(Timestamp::from_millis(1500))
    );
    assert_eq!(
        Timestamp::try_from_secs_f64(1e15),
        Ok(Timestamp::from_nanos(u64::MAX)),
        "Far-future values should saturate"
    );

    for invalid in [-1.0, f64::NAN, f64::INFINITY, 1e30] {
        assert!(
            Timestamp::try_from_secs_f64(invalid).is_err(),
            "{invalid} should be rejected"
        );
    }
}
