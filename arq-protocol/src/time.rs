//! Virtual time for the protocol core
//!
//! The state machines never read a real clock. The driving layer (channel
//! simulator or test harness) supplies the current [`Timestamp`] with every
//! operation, which keeps timer bookkeeping deterministic and testable.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::time::Duration;

/// Monotonic virtual timestamp in microseconds since session start
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The session start time
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from microseconds since session start
    #[inline]
    pub fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    /// Microseconds since session start
    #[inline]
    pub fn as_micros(self) -> u64 {
        self.0
    }

    /// Duration elapsed from `earlier` to `self`
    ///
    /// Saturates to zero when `earlier` is in the future, mirroring
    /// `Instant::saturating_duration_since`.
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }

    /// Whether this point in time has been reached at `now`
    #[inline]
    pub fn is_due(self, now: Timestamp) -> bool {
        self <= now
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, duration: Duration) -> Timestamp {
        Timestamp(self.0 + duration.as_micros() as u64)
    }
}

impl AddAssign<Duration> for Timestamp {
    fn add_assign(&mut self, duration: Duration) {
        self.0 += duration.as_micros() as u64;
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    /// Saturating difference between two timestamps
    fn sub(self, earlier: Timestamp) -> Duration {
        self.saturating_since(earlier)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0 as f64 / 1_000_000.0)
    }
}
