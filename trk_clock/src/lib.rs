#[cfg(test)]
#[macro_use]
extern crate approx;
pub use quanta::Instant;
use quanta::{Clock, Mock};
use std::sync::Arc;
use std::time::Duration;

/// Acquisition timestamps are floating point seconds from the clock reference.
pub type Timestamp = f64;

/// Converts a duration to timestamp seconds.
#[inline]
pub fn to_seconds(duration: Duration) -> Timestamp {
    duration.as_secs_f64()
}

/// Converts timestamp seconds to a duration, negative values clamp to zero.
#[inline]
pub fn from_seconds(seconds: Timestamp) -> Duration {
    if seconds <= 0.0 || !seconds.is_finite() {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(seconds)
    }
}

/// A running acquisition clock.
/// The clock is a monotonic clock that starts at an arbitrary reference time.
/// It is clone resilient, ie a clone will be the same clock, even when mocked.
#[derive(Clone, Debug)]
pub struct AcquisitionClock {
    inner: Clock,
    ref_time: Instant,
}

/// A mock clock that can be controlled by the user.
#[derive(Debug, Clone)]
pub struct AcquisitionClockMock(Arc<Mock>);

impl AcquisitionClockMock {
    pub fn increment(&self, amount: Duration) {
        self.0.increment(amount);
    }

    /// Advances the clock by a number of seconds.
    pub fn advance(&self, seconds: Timestamp) {
        self.increment(from_seconds(seconds));
    }

    /// Gets the current value of time in nanoseconds.
    pub fn value(&self) -> u64 {
        self.0.value()
    }

    /// Sets the absolute value of the time in seconds.
    /// Going backward breaks the monotonicity of the clock.
    pub fn set_value(&self, seconds: Timestamp) {
        let target = from_seconds(seconds);
        let current = Duration::from_nanos(self.0.value());
        if current < target {
            self.0.increment(target - current);
        } else {
            self.0.decrement(current - target);
        }
    }
}

impl AcquisitionClock {
    /// Creates a clock using now as its reference time.
    pub fn new() -> Self {
        let clock = Clock::new();
        let ref_time = clock.now();
        AcquisitionClock {
            inner: clock,
            ref_time,
        }
    }

    /// Builds a monotonic clock that already reads `seconds` at creation.
    pub fn from_ref_time(seconds: Timestamp) -> Self {
        let clock = Clock::new();
        let ref_time = clock.now() - from_seconds(seconds);
        AcquisitionClock {
            inner: clock,
            ref_time,
        }
    }

    /// Build a fake clock with a reference time of 0.
    /// The mock handle controls all the clones of the clock.
    pub fn mock() -> (Self, AcquisitionClockMock) {
        let (clock, mock) = Clock::mock();
        let ref_time = clock.now();
        (
            AcquisitionClock {
                inner: clock,
                ref_time,
            },
            AcquisitionClockMock(mock),
        )
    }

    /// Elapsed time since the reference.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.inner.now().saturating_duration_since(self.ref_time)
    }

    /// Seconds since the reference time, monotonically increasing.
    #[inline]
    pub fn now(&self) -> Timestamp {
        to_seconds(self.elapsed())
    }

    // A less precise but quicker time
    #[inline]
    pub fn recent(&self) -> Timestamp {
        to_seconds(self.inner.recent().saturating_duration_since(self.ref_time))
    }
}

impl Default for AcquisitionClock {
    fn default() -> Self {
        Self::new()
    }
}

/// A trait to provide a clock to the collector and its sources.
pub trait ClockProvider {
    fn get_clock(&self) -> AcquisitionClock;
}
