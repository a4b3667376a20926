//! Logical time: timestamps, clocks, and the timer provider.
//!
//! The runloop never reads the wall clock directly. It asks a [`Clock`] for the
//! current [`Timestamp`] and, when nothing is due yet, asks the same clock to
//! block the whole process until the next entry is due.
//!
//! - [`SystemClock`] measures real elapsed time and really sleeps.
//! - [`VirtualClock`] only moves when the runloop sleeps, which makes every
//!   schedule deterministic and instant. Tests and the demo's `--virtual`
//!   mode use it.
//!
//! # Example: Sleep
//!
//! ```ignore
//! use cooprt::{Runloop, Task};
//! use cooprt::time::sleep;
//! use std::time::Duration;
//!
//! let rt = Runloop::builder().virtual_time().build();
//! let handle = rt.handle();
//!
//! Task::spawn(async move {
//!     sleep(&handle, Duration::from_secs(1)).await;
//!     println!("one logical second later");
//! });
//!
//! rt.run();
//! ```

pub mod sleep;
pub mod wrapper;

pub use sleep::{Timer, sleep};

use std::cell::Cell;
use std::fmt;
use std::ops::{Add, Sub};
use std::rc::Rc;
use std::time::{Duration, Instant, TryFromFloatSecsError};

/// A point in logical time, in nanoseconds since the clock's epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The clock epoch.
    pub const ZERO: Self = Self(0);

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Converts fractional seconds since the epoch.
    ///
    /// Values past the last representable instant saturate to it.
    ///
    /// # Errors
    /// Fails for negative or non-finite input, or input too large for a
    /// [`Duration`].
    pub fn try_from_secs_f64(secs: f64) -> Result<Self, TryFromFloatSecsError> {
        Ok(Self::ZERO + Duration::try_from_secs_f64(secs)?)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Time elapsed since the epoch.
    pub const fn since_epoch(self) -> Duration {
        Duration::from_nanos(self.0)
    }

    /// Returns the duration from `earlier` to `self`, or zero if `earlier` is later.
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let nanos = u64::try_from(rhs.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(nanos))
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_duration_since(rhs)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ns)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:03}s",
            self.0 / 1_000_000_000,
            (self.0 / 1_000_000) % 1_000
        )
    }
}

/// Source of logical time plus the process-blocking primitive.
///
/// Implementations must be monotonic: `now()` never goes backwards, and after
/// `sleep(d)` returns, `now()` is at least `d` later than before the call.
pub trait Clock {
    /// Returns the current logical time.
    fn now(&self) -> Timestamp;

    /// Blocks the whole process for `duration`.
    ///
    /// Only the runloop calls this, and only when no entry is due.
    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Wall-clock time measured from the moment the clock was created.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::ZERO + self.epoch.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Simulated time that advances only when the runloop sleeps.
///
/// # Example
///
/// ```ignore
/// use cooprt::time::{Clock, Timestamp, VirtualClock};
/// use std::time::Duration;
///
/// let clock = VirtualClock::new();
/// clock.sleep(Duration::from_secs(2));
/// assert_eq!(clock.now(), Timestamp::from_secs(2));
/// ```
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Cell<u64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock that starts at `start` instead of the epoch.
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            now: Cell::new(start.as_nanos()),
        }
    }

    /// Moves time forward to `target`. Earlier targets are ignored.
    pub fn advance_to(&self, target: Timestamp) {
        if target.as_nanos() > self.now.get() {
            self.now.set(target.as_nanos());
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.now.get())
    }

    fn sleep(&self, duration: Duration) {
        self.advance_to(self.now() + duration);
    }
}
