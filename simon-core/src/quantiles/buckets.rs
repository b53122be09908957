//! Fixed-width histogram with underflow and overflow buckets.

use parking_lot::Mutex;
use simon_types::{BucketSample, BucketsSample, OutOfRange, PercentileSample, QuantileEstimate};

use crate::error::{Error, Result};

/// Quantiles are refused below this many recorded values.
pub const DEFAULT_MIN_SAMPLES: u64 = 20;

/// Percentiles included in [`Buckets::sample`].
pub const DEFAULT_PERCENTILES: [f64; 3] = [50.0, 90.0, 99.0];

/// Largest number of interior buckets a histogram may have.
pub const MAX_BUCKETS: usize = 1 << 20;

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    count: u64,
    sum: f64,
    sum_of_squares: f64,
}

impl Bucket {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_of_squares += value * value;
    }
}

/// A histogram of `count` equal-width buckets over `[min, max)`.
///
/// Values below `min` land in an underflow bucket, values at or above `max`
/// in an overflow bucket. Each bucket keeps its count, sum and sum of
/// squares, so the mean and variance of all values stay exact while
/// quantiles are interpolated inside the bucket that holds them.
///
/// ```rust
/// use simon_core::quantiles::Buckets;
///
/// let buckets = Buckets::new(0, 100, 10).unwrap();
/// for v in 0..100 {
///     buckets.add_value(v);
/// }
/// let median = buckets.median().unwrap();
/// assert!(median.is_reliable());
/// assert!((median.value - 50.0).abs() < 1.0);
/// ```
#[derive(Debug)]
pub struct Buckets {
    min: u64,
    max: u64,
    width: f64,
    min_samples: u64,
    /// Underflow, the interior buckets in order, overflow.
    buckets: Mutex<Vec<Bucket>>,
}

impl Buckets {
    /// Creates `count` interior buckets over `[min, max)`.
    ///
    /// `count` must lie between 1 and [`MAX_BUCKETS`].
    pub fn new(min: u64, max: u64, count: usize) -> Result<Self> {
        if min >= max || count == 0 || count > MAX_BUCKETS {
            return Err(Error::InvalidBuckets { min, max, count });
        }
        Ok(Self {
            min,
            max,
            width: (max - min) as f64 / count as f64,
            min_samples: DEFAULT_MIN_SAMPLES,
            buckets: Mutex::new(vec![Bucket::default(); count + 2]),
        })
    }

    /// Changes the number of values required before quantiles are computed.
    pub fn with_min_samples(mut self, min_samples: u64) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// Number of interior buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().len() - 2
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn add_value(&self, value: u64) {
        let mut buckets = self.buckets.lock();
        let index = self.index_of(value, buckets.len() - 2);
        buckets[index].add(value as f64);
    }

    fn index_of(&self, value: u64, interior: usize) -> usize {
        if value < self.min {
            0
        } else if value >= self.max {
            interior + 1
        } else {
            let offset = ((value - self.min) as f64 / self.width) as usize;
            offset.min(interior - 1) + 1
        }
    }

    fn snapshot(&self) -> Vec<Bucket> {
        self.buckets.lock().clone()
    }

    /// Total number of recorded values, underflow and overflow included.
    pub fn count(&self) -> u64 {
        self.buckets.lock().iter().map(|b| b.count).sum()
    }

    /// Estimates the value below which `ratio` of all values fall.
    ///
    /// `ratio` must lie strictly between 0 and 1. Estimates that land in the
    /// underflow or overflow bucket carry an [`OutOfRange`] flag.
    pub fn quantile(&self, ratio: f64) -> Result<QuantileEstimate> {
        self.estimate(&self.snapshot(), ratio)
    }

    pub fn median(&self) -> Result<QuantileEstimate> {
        self.quantile(0.5)
    }

    pub fn percentile90(&self) -> Result<QuantileEstimate> {
        self.quantile(0.9)
    }

    fn estimate(&self, buckets: &[Bucket], ratio: f64) -> Result<QuantileEstimate> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(Error::InvalidQuantile(ratio));
        }
        let total: u64 = buckets.iter().map(|b| b.count).sum();
        if total < self.min_samples || total == 0 {
            return Err(Error::NotEnoughSamples {
                count: total,
                required: self.min_samples.max(1),
            });
        }

        let target = ratio * total as f64;
        let overflow = buckets.len() - 1;
        let mut before = 0.0;
        for (index, bucket) in buckets.iter().enumerate() {
            let count = bucket.count as f64;
            if bucket.count > 0 && target >= before && target < before + count {
                return Ok(match index {
                    0 => QuantileEstimate {
                        value: self.min as f64,
                        out_of_range: Some(OutOfRange::BelowMin),
                    },
                    i if i == overflow => QuantileEstimate {
                        value: self.max as f64,
                        out_of_range: Some(OutOfRange::AboveMax),
                    },
                    i => {
                        let position = (i - 1) as f64 + (target - before) / count;
                        QuantileEstimate::exact(self.min as f64 + self.width * position)
                    }
                });
            }
            before += count;
        }

        Ok(QuantileEstimate {
            value: self.max as f64,
            out_of_range: Some(OutOfRange::AboveMax),
        })
    }

    /// Mean of every recorded value, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        moments(&self.snapshot()).map(|(mean, _)| mean)
    }

    /// Population variance of every recorded value, `None` when empty.
    pub fn variance(&self) -> Option<f64> {
        moments(&self.snapshot()).map(|(_, variance)| variance)
    }

    pub fn standard_deviation(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    /// Forgets every recorded value. Bounds are kept.
    pub fn clear(&self) {
        self.buckets
            .lock()
            .iter_mut()
            .for_each(|b| *b = Bucket::default());
    }

    /// Sample with the default percentiles (50, 90, 99).
    pub fn sample(&self) -> BucketsSample {
        self.sample_with(&DEFAULT_PERCENTILES)
    }

    /// Sample with the given percentiles, each between 0 and 100 exclusive.
    ///
    /// Every figure comes from one consistent view of the buckets.
    pub fn sample_with(&self, percentiles: &[f64]) -> BucketsSample {
        let buckets = self.snapshot();
        let (mean, variance) = moments(&buckets).unwrap_or((0.0, 0.0));
        let interior = buckets.len() - 2;

        let bucket_samples = buckets
            .iter()
            .enumerate()
            .map(|(index, bucket)| {
                let (lower, upper) = match index {
                    0 => (None, Some(self.min as f64)),
                    i if i == interior + 1 => (Some(self.max as f64), None),
                    i => {
                        let lower = self.min as f64 + self.width * (i - 1) as f64;
                        (Some(lower), Some(lower + self.width))
                    }
                };
                BucketSample {
                    lower,
                    upper,
                    count: bucket.count,
                }
            })
            .collect();

        let percentiles = percentiles
            .iter()
            .map(|&percentile| PercentileSample {
                percentile,
                estimate: self.estimate(&buckets, percentile / 100.0).ok(),
            })
            .collect();

        BucketsSample {
            min: self.min,
            max: self.max,
            count: buckets.iter().map(|b| b.count).sum(),
            mean,
            standard_deviation: variance.sqrt(),
            buckets: bucket_samples,
            percentiles,
        }
    }
}

/// Mean and population variance over all buckets.
fn moments(buckets: &[Bucket]) -> Option<(f64, f64)> {
    let count: u64 = buckets.iter().map(|b| b.count).sum();
    if count == 0 {
        return None;
    }
    let n = count as f64;
    let sum: f64 = buckets.iter().map(|b| b.sum).sum();
    let sum_of_squares: f64 = buckets.iter().map(|b| b.sum_of_squares).sum();
    let mean = sum / n;
    let variance = (sum_of_squares / n - mean * mean).max(0.0);
    Some((mean, variance))
}
