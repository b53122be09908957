//! Stopwatches and splits.

use std::fmt;
use std::ops::Deref;

use simon_types::{Nanoseconds, StopwatchSample};

use crate::callback::Callback;
use crate::error::Result;
use crate::name::SEPARATOR;
use crate::node::{Core, Extremum, Kind};
use crate::simon::Simon;

/// Measurements of one stopwatch.
///
/// Mean and variance are kept with Welford's online recurrence: `m2` is
/// the running sum of squared deviations from the mean.
#[derive(Debug, Clone, Default)]
pub(crate) struct StopwatchData {
    total: u64,
    counter: u64,
    min: Option<Extremum<u64>>,
    max: Option<Extremum<u64>>,
    active: u64,
    max_active: u64,
    max_active_timestamp: Option<u64>,
    last: u64,
    mean: f64,
    m2: f64,
}

impl StopwatchData {
    fn start(&mut self, now: u64) {
        self.active += 1;
        if self.active > self.max_active {
            self.max_active = self.active;
            self.max_active_timestamp = Some(now);
        }
    }

    fn stop(&mut self, duration: u64, now: u64) {
        self.active = self.active.saturating_sub(1);
        self.add(duration, now);
    }

    fn add(&mut self, duration: u64, now: u64) {
        self.total = self.total.saturating_add(duration);
        self.counter += 1;
        self.last = duration;
        Extremum::lower(&mut self.min, duration, now);
        Extremum::raise(&mut self.max, duration, now);

        let x = duration as f64;
        let delta = x - self.mean;
        self.mean += delta / self.counter as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Zeroes the accumulators. Running splits stay active and will be
    /// recorded with their full duration when stopped.
    pub(crate) fn reset(&mut self, now: u64) {
        let active = self.active;
        *self = Self {
            active,
            max_active: active,
            max_active_timestamp: (active > 0).then_some(now),
            ..Self::default()
        };
    }

    pub(crate) fn sample(&self, name: &str, core: &Core) -> StopwatchSample {
        let variance = if self.counter > 1 {
            self.m2 / (self.counter - 1) as f64
        } else {
            0.0
        };
        let variance_n = if self.counter > 0 {
            self.m2 / self.counter as f64
        } else {
            0.0
        };

        StopwatchSample {
            name: name.to_string(),
            total: self.total,
            min: self.min.map(|e| e.value),
            max: self.max.map(|e| e.value),
            min_timestamp: self.min.map(|e| e.timestamp),
            max_timestamp: self.max.map(|e| e.timestamp),
            active: self.active,
            max_active: self.max_active,
            max_active_timestamp: self.max_active_timestamp,
            last: self.last,
            mean: self.mean,
            standard_deviation: variance.sqrt(),
            variance,
            variance_n,
            counter: self.counter,
            note: core.note.clone(),
            first_usage: core.first_usage,
            last_usage: core.last_usage,
        }
    }
}

/// A stopwatch monitor.
///
/// ```rust
/// use simon_core::Manager;
///
/// let manager = Manager::new();
/// let stopwatch = manager.get_stopwatch("db.query").unwrap();
///
/// let mut split = stopwatch.start();
/// // ... timed work ...
/// split.stop();
///
/// {
///     let _split = stopwatch.start(); // stopped when dropped
/// }
///
/// let sample = stopwatch.sample().unwrap();
/// assert_eq!(sample.counter, 2);
/// assert_eq!(sample.active, 0);
/// ```
#[derive(Clone)]
pub struct Stopwatch {
    simon: Simon,
}

impl Stopwatch {
    pub(crate) fn from_simon(simon: Simon) -> Self {
        Self { simon }
    }

    /// A stopwatch that ignores every operation.
    pub fn null() -> Self {
        Self::from_simon(Simon::null())
    }

    /// Starts a split.
    ///
    /// On a disabled stopwatch the split still measures time but is never
    /// recorded, even if the stopwatch is enabled before it stops.
    pub fn start(&self) -> Split {
        let Some(node) = self.simon.node() else {
            return Split::new(self.clone(), 0, false);
        };
        let context = &node.context;
        let start = context.clock.nanos();
        if !node.is_enabled() {
            return Split::new(self.clone(), start, false);
        }
        let now = context.clock.millis();

        let guard = node.lock();
        let started = {
            let mut core = guard.borrow_mut();
            core.touch(now);
            match &mut core.kind {
                Kind::Stopwatch(data) => {
                    data.start(now);
                    true
                }
                _ => false,
            }
        };
        let split = Split::new(self.clone(), start, started);
        if started && context.has_callbacks() {
            context.callback.on_stopwatch_start(&split);
        }
        drop(guard);
        split
    }

    /// Records a split measured elsewhere, `nanos` long.
    ///
    /// Returns the already stopped split.
    pub fn add(&self, nanos: u64) -> Split {
        let start = self
            .simon
            .node()
            .map_or(0, |node| node.context.clock.nanos().saturating_sub(nanos));
        let split = Split::completed(self.clone(), start, nanos);
        self.add_split(&split);
        split
    }

    /// Records the duration of `split`, typically one from another stopwatch.
    pub fn add_split(&self, split: &Split) {
        let Some(node) = self.simon.node() else {
            return;
        };
        if !node.is_enabled() {
            return;
        }
        let context = &node.context;
        let duration = split.running_for();
        let now = context.clock.millis();

        let guard = node.lock();
        let sample = {
            let mut core = guard.borrow_mut();
            core.touch(now);
            let Kind::Stopwatch(data) = &mut core.kind else {
                return;
            };
            data.add(duration, now);
            if !context.has_callbacks() {
                return;
            }
            core.stopwatch_sample(node.name())
        };
        if let Some(sample) = sample {
            context.callback.on_stopwatch_add(self, split, &sample);
        }
        drop(guard);
    }

    fn record_stop(&self, split: &Split, duration: u64) {
        let Some(node) = self.simon.node() else {
            return;
        };
        let context = &node.context;
        let now = context.clock.millis();

        let guard = node.lock();
        let sample = {
            let mut core = guard.borrow_mut();
            core.touch(now);
            let Kind::Stopwatch(data) = &mut core.kind else {
                return;
            };
            data.stop(duration, now);
            if !context.has_callbacks() {
                return;
            }
            core.stopwatch_sample(node.name())
        };
        if let Some(sample) = sample {
            context.callback.on_stopwatch_stop(split, &sample);
        }
        drop(guard);
    }

    /// Current sample. Available whether or not the stopwatch is enabled.
    pub fn sample(&self) -> Option<StopwatchSample> {
        let node = self.simon.node()?;
        let guard = node.lock();
        let sample = guard.borrow().stopwatch_sample(node.name());
        sample
    }

    /// Samples and resets in one atomic step.
    pub fn sample_and_reset(&self) -> Option<StopwatchSample> {
        let node = self.simon.node()?;
        let guard = node.lock();
        let sample = guard.borrow().stopwatch_sample(node.name());
        self.simon.reset();
        drop(guard);
        sample
    }

    /// The generic handle of this stopwatch.
    pub fn as_simon(&self) -> &Simon {
        &self.simon
    }
}

impl Deref for Stopwatch {
    type Target = Simon;

    fn deref(&self) -> &Simon {
        &self.simon
    }
}

impl fmt::Debug for Stopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stopwatch")
            .field("name", &self.name())
            .field("sample", &self.sample())
            .finish()
    }
}

/// One measurement of a [`Stopwatch`].
///
/// A split that is dropped while running is stopped, so it never leaves
/// the stopwatch's active count elevated.
pub struct Split {
    stopwatch: Stopwatch,
    start: u64,
    elapsed: Option<u64>,
    counted: bool,
}

impl Split {
    fn new(stopwatch: Stopwatch, start: u64, counted: bool) -> Self {
        Self {
            stopwatch,
            start,
            elapsed: None,
            counted,
        }
    }

    fn completed(stopwatch: Stopwatch, start: u64, elapsed: u64) -> Self {
        Self {
            stopwatch,
            start,
            elapsed: Some(elapsed),
            counted: false,
        }
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    /// Clock nanos at which the split started.
    pub fn start_nanos(&self) -> u64 {
        self.start
    }

    pub fn is_running(&self) -> bool {
        self.elapsed.is_none()
    }

    /// Whether stopping this split updates its stopwatch.
    pub fn is_counted(&self) -> bool {
        self.counted
    }

    /// Elapsed nanos so far, or the final duration once stopped.
    pub fn running_for(&self) -> u64 {
        match self.elapsed {
            Some(elapsed) => elapsed,
            None => self
                .stopwatch
                .node()
                .map_or(0, |node| node.context.clock.nanos().saturating_sub(self.start)),
        }
    }

    /// Stops the split and returns its duration in nanos.
    ///
    /// Only the first call records anything; later calls return the same
    /// duration.
    pub fn stop(&mut self) -> u64 {
        if let Some(elapsed) = self.elapsed {
            return elapsed;
        }
        let duration = self.running_for();
        self.elapsed = Some(duration);
        if self.counted {
            self.stopwatch.record_stop(self, duration);
        }
        duration
    }

    /// Stops the split and also adds it to the stopwatch named `<name>.<sub>`.
    ///
    /// Useful to break one measurement point down by outcome, for example
    /// `split.stop_with("error")`. Fails only if `sub` makes an invalid
    /// name or that name belongs to a counter.
    pub fn stop_with(&mut self, sub: &str) -> Result<u64> {
        let first_stop = self.is_running();
        let duration = self.stop();
        if first_stop && self.counted {
            if let Some(manager) = self.stopwatch.manager() {
                let name = format!("{}{}{}", self.stopwatch.name(), SEPARATOR, sub);
                manager.get_stopwatch(&name)?.add_split(self);
            }
        }
        Ok(duration)
    }
}

impl Drop for Split {
    fn drop(&mut self) {
        if self.is_running() && self.counted {
            self.stop();
        }
    }
}

impl fmt::Debug for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Split")
            .field("stopwatch", &self.stopwatch.name())
            .field("start", &self.start)
            .field("running", &self.is_running())
            .field("elapsed", &Nanoseconds(self.running_for()).to_string())
            .finish()
    }
}
