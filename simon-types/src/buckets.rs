//! Histogram samples and quantile estimates.

use alloc::vec::Vec;

/// Why a quantile estimate is unreliable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OutOfRange {
    /// The quantile lies in the underflow bucket; the value is the lower bound.
    BelowMin,
    /// The quantile lies in the overflow bucket; the value is the upper bound.
    AboveMax,
}

/// A quantile estimate produced from bucketed data.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuantileEstimate {
    pub value: f64,

    /// Set when the estimate fell outside the interior buckets.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub out_of_range: Option<OutOfRange>,
}

impl QuantileEstimate {
    /// An estimate that fell inside the interior buckets.
    pub const fn exact(value: f64) -> Self {
        Self {
            value,
            out_of_range: None,
        }
    }

    /// True if the estimate came from an interior bucket.
    pub fn is_reliable(&self) -> bool {
        self.out_of_range.is_none()
    }
}

/// Count of one bucket. `None` bounds are unbounded.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BucketSample {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub count: u64,
}

/// Estimate for one requested percentile.
///
/// `estimate` is `None` when the histogram held too few values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PercentileSample {
    /// Requested percentile, 0 to 100 exclusive.
    pub percentile: f64,
    pub estimate: Option<QuantileEstimate>,
}

/// Snapshot of a bucketed histogram.
///
/// `buckets` holds the underflow bucket first, then the interior buckets in
/// ascending order, then the overflow bucket.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BucketsSample {
    pub min: u64,
    pub max: u64,
    pub count: u64,
    pub mean: f64,
    pub standard_deviation: f64,
    pub buckets: Vec<BucketSample>,
    pub percentiles: Vec<PercentileSample>,
}

impl BucketsSample {
    /// Estimate for the given percentile, if it was requested and available.
    pub fn percentile(&self, percentile: f64) -> Option<&QuantileEstimate> {
        self.percentiles
            .iter()
            .find(|p| (p.percentile - percentile).abs() < f64::EPSILON)
            .and_then(|p| p.estimate.as_ref())
    }

    /// Estimate for the 50th percentile.
    pub fn median(&self) -> Option<&QuantileEstimate> {
        self.percentile(50.0)
    }
}
