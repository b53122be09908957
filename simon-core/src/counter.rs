//! Counters: a signed value with tracked extrema.

use std::fmt;
use std::ops::Deref;

use simon_types::CounterSample;

use crate::callback::Callback;
use crate::node::{Core, Extremum, Kind};
use crate::simon::Simon;

/// Measurements of one counter.
#[derive(Debug, Clone, Default)]
pub(crate) struct CounterData {
    counter: i64,
    min: Option<Extremum<i64>>,
    max: Option<Extremum<i64>>,
    increment_sum: u64,
    decrement_sum: u64,
}

impl CounterData {
    fn track(&mut self, now: u64) {
        Extremum::lower(&mut self.min, self.counter, now);
        Extremum::raise(&mut self.max, self.counter, now);
    }

    fn increase(&mut self, by: u64, now: u64) {
        self.counter = self.counter.saturating_add_unsigned(by);
        self.increment_sum = self.increment_sum.saturating_add(by);
        self.track(now);
    }

    fn decrease(&mut self, by: u64, now: u64) {
        self.counter = self.counter.saturating_sub_unsigned(by);
        self.decrement_sum = self.decrement_sum.saturating_add(by);
        self.track(now);
    }

    fn set(&mut self, value: i64, now: u64) {
        self.counter = value;
        self.track(now);
    }

    /// Zeroes the value, sums and extrema.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn sample(&self, name: &str, core: &Core) -> CounterSample {
        CounterSample {
            name: name.to_string(),
            counter: self.counter,
            min: self.min.map(|e| e.value),
            max: self.max.map(|e| e.value),
            min_timestamp: self.min.map(|e| e.timestamp),
            max_timestamp: self.max.map(|e| e.timestamp),
            increment_sum: self.increment_sum,
            decrement_sum: self.decrement_sum,
            note: core.note.clone(),
            first_usage: core.first_usage,
            last_usage: core.last_usage,
        }
    }
}

#[derive(Clone, Copy)]
enum Change {
    Increase(u64),
    Decrease(u64),
    Set(i64),
}

/// A counter monitor.
///
/// Every update is atomic with respect to samples and fires the matching
/// callback event. Updates on a disabled counter are ignored.
///
/// ```rust
/// use simon_core::Manager;
///
/// let manager = Manager::new();
/// let counter = manager.get_counter("queue.depth").unwrap();
/// counter.increase(5).decrement();
///
/// let sample = counter.sample().unwrap();
/// assert_eq!(sample.counter, 4);
/// assert_eq!(sample.max, Some(5));
/// ```
#[derive(Clone)]
pub struct Counter {
    simon: Simon,
}

impl Counter {
    pub(crate) fn from_simon(simon: Simon) -> Self {
        Self { simon }
    }

    /// A counter that ignores every operation.
    pub fn null() -> Self {
        Self::from_simon(Simon::null())
    }

    pub fn increment(&self) -> &Self {
        self.increase(1)
    }

    pub fn decrement(&self) -> &Self {
        self.decrease(1)
    }

    pub fn increase(&self, by: u64) -> &Self {
        self.apply(Change::Increase(by))
    }

    pub fn decrease(&self, by: u64) -> &Self {
        self.apply(Change::Decrease(by))
    }

    /// Sets the value. Extrema are updated as for any other change.
    pub fn set(&self, value: i64) -> &Self {
        self.apply(Change::Set(value))
    }

    fn apply(&self, change: Change) -> &Self {
        let Some(node) = self.simon.node() else {
            return self;
        };
        if !node.is_enabled() {
            return self;
        }
        let context = &node.context;
        let now = context.clock.millis();

        let guard = node.lock();
        let sample = {
            let mut core = guard.borrow_mut();
            core.touch(now);
            let Kind::Counter(data) = &mut core.kind else {
                return self;
            };
            match change {
                Change::Increase(by) => data.increase(by, now),
                Change::Decrease(by) => data.decrease(by, now),
                Change::Set(value) => data.set(value, now),
            }
            if !context.has_callbacks() {
                return self;
            }
            core.counter_sample(node.name())
        };

        if let Some(sample) = sample {
            match change {
                Change::Increase(by) => context.callback.on_counter_increase(self, by, &sample),
                Change::Decrease(by) => context.callback.on_counter_decrease(self, by, &sample),
                Change::Set(value) => context.callback.on_counter_set(self, value, &sample),
            }
        }
        drop(guard);
        self
    }

    /// Current sample. Available whether or not the counter is enabled.
    pub fn sample(&self) -> Option<CounterSample> {
        let node = self.simon.node()?;
        let guard = node.lock();
        let sample = guard.borrow().counter_sample(node.name());
        sample
    }

    /// Samples and resets in one atomic step.
    pub fn sample_and_reset(&self) -> Option<CounterSample> {
        let node = self.simon.node()?;
        let guard = node.lock();
        let sample = guard.borrow().counter_sample(node.name());
        self.simon.reset();
        drop(guard);
        sample
    }

    /// The generic handle of this counter.
    pub fn as_simon(&self) -> &Simon {
        &self.simon
    }
}

impl Deref for Counter {
    type Target = Simon;

    fn deref(&self) -> &Simon {
        &self.simon
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("name", &self.name())
            .field("sample", &self.sample())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use simon_types::SimonState;

    use super::*;
    use crate::clock::MockClock;
    use crate::Manager;

    fn manager() -> (Manager, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new(0, 1_000));
        let manager = Manager::builder().clock(clock.clone()).build();
        (manager, clock)
    }

    #[test]
    fn test_extrema_follow_every_change() {
        let (manager, clock) = manager();
        let counter = manager.get_counter("c").unwrap();

        counter.increase(3);
        clock.advance(1);
        counter.decrease(5);
        clock.advance(1);
        counter.set(10);

        let sample = counter.sample().unwrap();
        assert_eq!(sample.counter, 10);
        assert_eq!(sample.min, Some(-2));
        assert_eq!(sample.min_timestamp, Some(1_001));
        assert_eq!(sample.max, Some(10));
        assert_eq!(sample.max_timestamp, Some(1_002));
        assert_eq!(sample.increment_sum, 3);
        assert_eq!(sample.decrement_sum, 5);
        assert_eq!(sample.first_usage, 1_000);
        assert_eq!(sample.last_usage, 1_002);
    }

    #[test]
    fn test_fresh_counter_has_no_extrema() {
        let (manager, _) = manager();
        let sample = manager.get_counter("c").unwrap().sample().unwrap();
        assert_eq!(sample.counter, 0);
        assert!(sample.min.is_none());
        assert!(sample.max.is_none());
    }

    #[test]
    fn test_disabled_counter_ignores_updates() {
        let (manager, _) = manager();
        let counter = manager.get_counter("c").unwrap();
        counter.set_state(SimonState::Disabled, false);
        counter.increment().increase(4).set(9);
        assert_eq!(counter.sample().unwrap().counter, 0);
        assert_eq!(counter.first_usage(), 0);
    }

    #[test]
    fn test_sample_and_reset() {
        let (manager, _) = manager();
        let counter = manager.get_counter("c").unwrap();
        counter.increase(7);

        let before = counter.sample_and_reset().unwrap();
        assert_eq!(before.counter, 7);

        let after = counter.sample().unwrap();
        assert_eq!(after.counter, 0);
        assert_eq!(after.increment_sum, 0);
        assert!(after.max.is_none());
        assert_eq!(counter.reset_timestamp(), 1_000);
    }

    #[test]
    fn test_events_carry_post_change_sample() {
        #[derive(Default)]
        struct Events(Mutex<Vec<(String, i64)>>);
        impl Callback for Events {
            fn on_counter_increase(&self, _c: &Counter, inc: u64, s: &CounterSample) {
                self.0.lock().push((format!("+{inc}"), s.counter));
            }
            fn on_counter_decrease(&self, _c: &Counter, dec: u64, s: &CounterSample) {
                self.0.lock().push((format!("-{dec}"), s.counter));
            }
            fn on_counter_set(&self, _c: &Counter, value: i64, s: &CounterSample) {
                self.0.lock().push((format!("={value}"), s.counter));
            }
        }

        let (manager, _) = manager();
        let events = Arc::new(Events::default());
        manager.add_callback(events.clone());

        let counter = manager.get_counter("c").unwrap();
        counter.increase(2).decrement().set(-4);

        assert_eq!(
            *events.0.lock(),
            vec![
                ("+2".to_string(), 2),
                ("-1".to_string(), 1),
                ("=-4".to_string(), -4)
            ]
        );
    }

    #[test]
    fn test_callback_can_sample_its_counter() {
        struct Resampler(Mutex<Option<i64>>);
        impl Callback for Resampler {
            fn on_counter_increase(&self, c: &Counter, _inc: u64, _s: &CounterSample) {
                *self.0.lock() = c.sample().map(|s| s.counter);
            }
        }

        let (manager, _) = manager();
        let resampler = Arc::new(Resampler(Mutex::new(None)));
        manager.add_callback(resampler.clone());
        manager.get_counter("c").unwrap().increase(3);

        assert_eq!(*resampler.0.lock(), Some(3));
    }

    #[test]
    fn test_null_counter() {
        let counter = Counter::null();
        counter.increment().set(5);
        assert!(counter.sample().is_none());
    }
}
