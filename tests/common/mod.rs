#![allow(dead_code)]

use cooprt::{Clock, Runloop, Timestamp, VirtualClock};

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;
use std::time::Duration;

static INIT_LOGGING: Once = Once::new();

/// Installs a test-writer subscriber once per test binary.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cooprt=trace")),
            )
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}

/// A runloop on simulated time.
pub fn virtual_runloop() -> Runloop {
    init_test_logging();
    Runloop::builder().virtual_time().build()
}

/// Virtual clock that remembers every sleep the runloop asked for.
#[derive(Clone, Default)]
pub struct RecordingClock {
    clock: Rc<VirtualClock>,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for RecordingClock {
    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.clock.sleep(duration);
    }
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

pub fn at(n: u64) -> Timestamp {
    Timestamp::from_secs(n)
}
