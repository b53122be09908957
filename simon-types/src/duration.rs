//! Nanosecond durations and their human readable presentation.
//!
//! Stopwatch samples carry raw `u64` nanoseconds so that reporters can emit
//! them unchanged. `Nanoseconds` wraps such a value when it has to be shown
//! to a person, e.g. in log lines.

use core::fmt;
use core::time::Duration;

/// Duration in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Nanoseconds(pub u64);

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

impl Nanoseconds {
    /// Create from nanoseconds.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Create from microseconds.
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros * NANOS_PER_MICRO)
    }

    /// Create from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * NANOS_PER_MILLI)
    }

    /// Get the value in nanoseconds.
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Get the value in milliseconds (truncated).
    pub const fn as_millis(&self) -> u64 {
        self.0 / NANOS_PER_MILLI
    }

    /// Convert to a standard Duration.
    pub const fn to_duration(&self) -> Duration {
        Duration::from_nanos(self.0)
    }
}

impl From<Duration> for Nanoseconds {
    fn from(d: Duration) -> Self {
        Self(d.as_nanos().min(u64::MAX as u128) as u64)
    }
}

impl From<Nanoseconds> for Duration {
    fn from(n: Nanoseconds) -> Self {
        Duration::from_nanos(n.0)
    }
}

impl From<u64> for Nanoseconds {
    fn from(nanos: u64) -> Self {
        Self(nanos)
    }
}

/// Presents the value with three significant digits and the largest unit
/// that keeps it at or above one, e.g. `1.23 ms` or `456 ns`.
impl fmt::Display for Nanoseconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (unit, divisor) = match self.0 {
            n if n < NANOS_PER_MICRO => return write!(f, "{} ns", n),
            n if n < NANOS_PER_MILLI => ("us", NANOS_PER_MICRO),
            n if n < NANOS_PER_SEC => ("ms", NANOS_PER_MILLI),
            _ => ("s", NANOS_PER_SEC),
        };

        let scaled = self.0 as f64 / divisor as f64;
        if scaled < 10.0 {
            write!(f, "{:.2} {}", scaled, unit)
        } else if scaled < 100.0 {
            write!(f, "{:.1} {}", scaled, unit)
        } else {
            write!(f, "{:.0} {}", scaled, unit)
        }
    }
}
