//! Quantile estimation for stopwatches.
//!
//! [`QuantilesCallback`] keeps a [`Buckets`] histogram per stopwatch, stored
//! as the stopwatch attribute [`ATTR_BUCKETS`], and feeds it every split.
//! How the histogram bounds are chosen is up to a [`BucketBuilder`]: fixed
//! bounds known up front, or bounds learned from a warm-up window.
//!
//! ```rust
//! use std::sync::Arc;
//! use simon_core::quantiles::{FixedBucketBuilder, QuantilesCallback};
//! use simon_core::Manager;
//!
//! let builder = FixedBucketBuilder::new(0, 1_000, 10).unwrap();
//! let manager = Manager::builder()
//!     .callback(Arc::new(QuantilesCallback::new(builder)))
//!     .build();
//!
//! let stopwatch = manager.get_stopwatch("render").unwrap();
//! for nanos in 0..100 {
//!     stopwatch.add(nanos * 10);
//! }
//! let median = QuantilesCallback::buckets(&stopwatch).unwrap().median().unwrap();
//! assert!((median.value - 500.0).abs() < 10.0);
//! ```

mod buckets;

pub use buckets::{Buckets, DEFAULT_MIN_SAMPLES, DEFAULT_PERCENTILES, MAX_BUCKETS};

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use simon_types::{BucketsSample, StopwatchSample};
use tracing::debug;

use crate::callback::Callback;
use crate::error::Result;
use crate::simon::Simon;
use crate::stopwatch::{Split, Stopwatch};

/// Attribute under which a stopwatch's histogram is stored.
pub const ATTR_BUCKETS: &str = "buckets";

/// Attribute holding values collected before the histogram exists.
pub const ATTR_WARMUP: &str = "buckets.warmup";

/// Strategy deciding when and how a stopwatch gets its histogram.
pub trait BucketBuilder: Send + Sync {
    /// Offers a value recorded by a stopwatch that has no histogram yet.
    ///
    /// Returns the histogram to install once one can be built. The returned
    /// histogram must already contain `value`. Called with the stopwatch
    /// locked.
    fn offer(&self, stopwatch: &Stopwatch, value: u64) -> Option<Buckets>;
}

/// Same bounds for every stopwatch.
#[derive(Debug, Clone)]
pub struct FixedBucketBuilder {
    min: u64,
    max: u64,
    count: usize,
}

impl FixedBucketBuilder {
    pub fn new(min: u64, max: u64, count: usize) -> Result<Self> {
        Buckets::new(min, max, count)?;
        Ok(Self { min, max, count })
    }
}

impl BucketBuilder for FixedBucketBuilder {
    fn offer(&self, _stopwatch: &Stopwatch, value: u64) -> Option<Buckets> {
        let buckets = Buckets::new(self.min, self.max, self.count).ok()?;
        buckets.add_value(value);
        Some(buckets)
    }
}

/// How learned bounds are widened to round numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsRounding {
    /// Powers of two.
    #[default]
    PowerOfTwo,
    /// Powers of ten.
    Decade,
}

impl BoundsRounding {
    /// Largest round number not above `value`.
    pub fn round_down(self, value: u64) -> u64 {
        if value == 0 {
            return 0;
        }
        match self {
            BoundsRounding::PowerOfTwo => 1 << (63 - value.leading_zeros()),
            BoundsRounding::Decade => {
                let mut decade = 1u64;
                while let Some(next) = decade.checked_mul(10).filter(|&n| n <= value) {
                    decade = next;
                }
                decade
            }
        }
    }

    /// Smallest round number not below `value`.
    pub fn round_up(self, value: u64) -> u64 {
        match self {
            BoundsRounding::PowerOfTwo => value.checked_next_power_of_two().unwrap_or(u64::MAX),
            BoundsRounding::Decade => {
                let mut decade = 1u64;
                while decade < value {
                    match decade.checked_mul(10) {
                        Some(next) => decade = next,
                        None => return u64::MAX,
                    }
                }
                decade
            }
        }
    }
}

/// Learns the bounds from the first `warmup` values of each stopwatch.
///
/// The observed range is widened to round bounds, then split into
/// power-of-two wide buckets, roughly `target_buckets` of them. The warm-up
/// values are replayed into the new histogram, so nothing is lost.
#[derive(Debug, Clone)]
pub struct AutoBucketBuilder {
    warmup: usize,
    target_buckets: usize,
    rounding: BoundsRounding,
}

impl AutoBucketBuilder {
    pub const DEFAULT_WARMUP: usize = 20;
    pub const DEFAULT_TARGET_BUCKETS: usize = 8;

    pub fn new() -> Self {
        Self {
            warmup: Self::DEFAULT_WARMUP,
            target_buckets: Self::DEFAULT_TARGET_BUCKETS,
            rounding: BoundsRounding::default(),
        }
    }

    pub fn warmup(mut self, warmup: usize) -> Self {
        self.warmup = warmup.max(1);
        self
    }

    pub fn target_buckets(mut self, target_buckets: usize) -> Self {
        self.target_buckets = target_buckets.clamp(1, MAX_BUCKETS);
        self
    }

    pub fn rounding(mut self, rounding: BoundsRounding) -> Self {
        self.rounding = rounding;
        self
    }

    /// Histogram bounds and bucket count for the warm-up values.
    pub fn bounds(&self, values: &[u64]) -> (u64, u64, usize) {
        let observed_min = values.iter().copied().min().unwrap_or(0);
        let observed_max = values.iter().copied().max().unwrap_or(0);

        let lower = self.rounding.round_down(observed_min);
        // the overflow bucket starts at max, keep the largest value inside
        let upper = self
            .rounding
            .round_up(observed_max.saturating_add(1))
            .max(lower + 1);

        let span = upper - lower;
        let mut width = BoundsRounding::PowerOfTwo
            .round_down((span / self.target_buckets as u64).max(1));
        while span.div_ceil(width) > MAX_BUCKETS as u64 {
            width <<= 1;
        }
        let count = span.div_ceil(width);
        let max = lower.saturating_add(count.saturating_mul(width));
        (lower, max, count as usize)
    }
}

impl Default for AutoBucketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketBuilder for AutoBucketBuilder {
    fn offer(&self, stopwatch: &Stopwatch, value: u64) -> Option<Buckets> {
        let warmup = stopwatch.attribute_or_insert_with(ATTR_WARMUP, || {
            Mutex::new(Vec::<u64>::with_capacity(self.warmup))
        })?;
        let mut values = warmup.lock();
        values.push(value);
        if values.len() < self.warmup {
            return None;
        }

        let (min, max, count) = self.bounds(&values);
        let buckets = Buckets::new(min, max, count).ok()?;
        for &v in values.iter() {
            buckets.add_value(v);
        }
        drop(values);
        stopwatch.remove_attribute(ATTR_WARMUP);
        debug!(
            stopwatch = stopwatch.name(),
            min, max, count, "quantile buckets built after warm-up"
        );
        Some(buckets)
    }
}

/// Callback maintaining a histogram per stopwatch.
pub struct QuantilesCallback {
    builder: Box<dyn BucketBuilder>,
}

impl QuantilesCallback {
    pub fn new(builder: impl BucketBuilder + 'static) -> Self {
        Self {
            builder: Box::new(builder),
        }
    }

    /// Quantiles with warm-up learned bounds and default settings.
    pub fn auto() -> Self {
        Self::new(AutoBucketBuilder::new())
    }

    /// The histogram of `stopwatch`, if it has one yet.
    pub fn buckets(stopwatch: &Stopwatch) -> Option<Arc<Buckets>> {
        stopwatch.attribute::<Buckets>(ATTR_BUCKETS)
    }

    /// Sample of the histogram of `stopwatch`, if it has one yet.
    pub fn sample_buckets(stopwatch: &Stopwatch) -> Option<BucketsSample> {
        Self::buckets(stopwatch).map(|b| b.sample())
    }

    fn record(&self, stopwatch: &Stopwatch, value: u64) {
        stopwatch.synchronized(|| {
            if let Some(buckets) = Self::buckets(stopwatch) {
                buckets.add_value(value);
            } else if let Some(buckets) = self.builder.offer(stopwatch, value) {
                stopwatch.set_attribute(ATTR_BUCKETS, buckets);
            }
        });
    }
}

impl Callback for QuantilesCallback {
    fn on_stopwatch_stop(&self, split: &Split, _sample: &StopwatchSample) {
        self.record(split.stopwatch(), split.running_for());
    }

    fn on_stopwatch_add(&self, stopwatch: &Stopwatch, split: &Split, _sample: &StopwatchSample) {
        self.record(stopwatch, split.running_for());
    }

    fn on_simon_reset(&self, simon: &Simon) {
        if let Some(stopwatch) = simon.as_stopwatch() {
            if let Some(buckets) = Self::buckets(&stopwatch) {
                buckets.clear();
            }
            stopwatch.remove_attribute(ATTR_WARMUP);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Manager;

    fn manager_with(builder: impl BucketBuilder + 'static) -> Manager {
        Manager::builder()
            .callback(Arc::new(QuantilesCallback::new(builder)))
            .build()
    }

    #[test]
    fn test_rounding() {
        let p2 = BoundsRounding::PowerOfTwo;
        assert_eq!(p2.round_down(1_000), 512);
        assert_eq!(p2.round_down(1), 1);
        assert_eq!(p2.round_down(0), 0);
        assert_eq!(p2.round_up(1_000), 1_024);
        assert_eq!(p2.round_up(1_024), 1_024);

        let dec = BoundsRounding::Decade;
        assert_eq!(dec.round_down(999), 100);
        assert_eq!(dec.round_down(1_000), 1_000);
        assert_eq!(dec.round_up(1_001), 10_000);
        assert_eq!(dec.round_up(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_auto_bounds_cover_observed_range() {
        let builder = AutoBucketBuilder::new();
        let (min, max, count) = builder.bounds(&[1_000_000, 1_000_000_000]);
        assert!(min <= 1_000_000);
        assert!(max > 1_000_000_000);
        assert!(count >= 1);
        let width = (max - min) / count as u64;
        assert!(width.is_power_of_two());
    }

    #[test]
    fn test_auto_bounds_for_identical_values() {
        let builder = AutoBucketBuilder::new();
        let (min, max, count) = builder.bounds(&[64; 20]);
        assert_eq!(min, 64);
        assert!(max > 64);
        assert!(count >= 1);
    }

    #[test]
    fn test_auto_bounds_stay_under_bucket_limit() {
        let builder = AutoBucketBuilder::new().target_buckets(usize::MAX);
        let (min, max, count) = builder.bounds(&[0, u64::MAX - 1]);
        assert!(count <= MAX_BUCKETS);
        assert!(Buckets::new(min, max, count).is_ok());

        let (_, _, count) = builder.bounds(&[0, 1 << 40]);
        assert!(count <= MAX_BUCKETS);
    }

    #[test]
    fn test_fixed_builder_installs_on_first_value() {
        let manager = manager_with(FixedBucketBuilder::new(0, 100, 10).unwrap());
        let stopwatch = manager.get_stopwatch("sw").unwrap();
        stopwatch.add(42);

        let buckets = QuantilesCallback::buckets(&stopwatch).unwrap();
        assert_eq!(buckets.count(), 1);
        assert_eq!((buckets.min(), buckets.max()), (0, 100));
    }

    #[test]
    fn test_auto_builder_warms_up() {
        let manager = manager_with(AutoBucketBuilder::new().warmup(5));
        let stopwatch = manager.get_stopwatch("sw").unwrap();

        for v in [100, 200, 300, 400] {
            stopwatch.add(v);
        }
        assert!(QuantilesCallback::buckets(&stopwatch).is_none());
        assert!(stopwatch.attribute_names().contains(&ATTR_WARMUP.to_string()));

        stopwatch.add(500);
        let buckets = QuantilesCallback::buckets(&stopwatch).unwrap();
        assert_eq!(buckets.count(), 5);
        assert!(buckets.min() <= 100);
        assert!(buckets.max() > 500);
        assert_eq!(stopwatch.attribute_names(), vec![ATTR_BUCKETS.to_string()]);

        stopwatch.add(250);
        assert_eq!(buckets.count(), 6);
    }

    #[test]
    fn test_reset_clears_histogram() {
        let manager = manager_with(FixedBucketBuilder::new(0, 100, 10).unwrap());
        let stopwatch = manager.get_stopwatch("sw").unwrap();
        stopwatch.add(1);
        stopwatch.add(2);
        stopwatch.reset();

        let sample = QuantilesCallback::sample_buckets(&stopwatch).unwrap();
        assert_eq!(sample.count, 0);
    }

    #[test]
    fn test_splits_feed_histogram() {
        let clock = Arc::new(crate::clock::MockClock::default());
        let manager = Manager::builder()
            .clock(clock.clone())
            .callback(Arc::new(QuantilesCallback::new(
                FixedBucketBuilder::new(0, 1_000, 4).unwrap(),
            )))
            .build();
        let stopwatch = manager.get_stopwatch("sw").unwrap();

        let mut split = stopwatch.start();
        clock.advance_nanos(300);
        split.stop();

        let sample = QuantilesCallback::sample_buckets(&stopwatch).unwrap();
        assert_eq!(sample.buckets[2].count, 1);
    }
}
