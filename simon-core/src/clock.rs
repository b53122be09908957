//! Time sources.
//!
//! Two readings are needed: a monotonic nanosecond counter for timing splits
//! and a wall-clock millisecond reading for usage and extrema timestamps.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of time for a registry.
pub trait Clock: Send + Sync + Debug {
    /// Monotonic nanoseconds from an arbitrary origin.
    fn nanos(&self) -> u64;

    /// Milliseconds since the Unix epoch.
    fn millis(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn nanos(&self) -> u64 {
        (**self).nanos()
    }

    fn millis(&self) -> u64 {
        (**self).millis()
    }
}

/// The default clock: `Instant` for nanos, `SystemTime` for millis.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A manually driven clock for tests.
///
/// Nanos and millis move independently; `advance` moves both consistently.
#[derive(Debug, Default)]
pub struct MockClock {
    nanos: AtomicU64,
    millis: AtomicU64,
}

impl MockClock {
    pub fn new(nanos: u64, millis: u64) -> Self {
        Self {
            nanos: AtomicU64::new(nanos),
            millis: AtomicU64::new(millis),
        }
    }

    /// Moves the nanosecond reading forward.
    pub fn advance_nanos(&self, amount: u64) {
        self.nanos.fetch_add(amount, Ordering::AcqRel);
    }

    /// Moves the millisecond reading forward.
    pub fn advance_millis(&self, amount: u64) {
        self.millis.fetch_add(amount, Ordering::AcqRel);
    }

    /// Moves both readings forward by `millis` milliseconds.
    pub fn advance(&self, millis: u64) {
        self.advance_millis(millis);
        self.advance_nanos(millis * 1_000_000);
    }

    pub fn set_millis(&self, millis: u64) {
        self.millis.store(millis, Ordering::Release);
    }
}

impl Clock for MockClock {
    fn nanos(&self) -> u64 {
        self.nanos.load(Ordering::Acquire)
    }

    fn millis(&self) -> u64 {
        self.millis.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.nanos();
        let b = clock.nanos();
        assert!(b >= a);
        assert!(clock.millis() > 1_600_000_000_000);
    }

    #[test]
    fn test_mock_clock_advances() {
        let clock = MockClock::new(100, 5);
        clock.advance_nanos(50);
        assert_eq!(clock.nanos(), 150);
        assert_eq!(clock.millis(), 5);

        clock.advance(2);
        assert_eq!(clock.nanos(), 2_000_150);
        assert_eq!(clock.millis(), 7);

        clock.set_millis(1000);
        assert_eq!(clock.millis(), 1000);
    }

    #[test]
    fn test_shared_clock_delegates() {
        let clock = Arc::new(MockClock::new(1, 2));
        let shared: Arc<dyn Clock> = clock.clone();
        clock.advance_nanos(9);
        assert_eq!(shared.nanos(), 10);
        assert_eq!(shared.millis(), 2);
    }
}
