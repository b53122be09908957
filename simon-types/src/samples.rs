//! Immutable monitor samples.
//!
//! The field sets are stable: CSV reporters and serializers depend on them,
//! and the CSV column order follows the declaration order below.

use alloc::string::String;

use crate::Nanoseconds;

/// Snapshot of a counter.
///
/// Extrema are `None` until the counter has been touched after creation or
/// the last reset.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterSample {
    /// Canonical dotted name.
    pub name: String,

    /// Current value.
    pub counter: i64,

    /// Lowest value observed.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub min: Option<i64>,

    /// Highest value observed.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max: Option<i64>,

    /// Unix millis when `min` was recorded.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub min_timestamp: Option<u64>,

    /// Unix millis when `max` was recorded.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max_timestamp: Option<u64>,

    /// Sum of all increments.
    pub increment_sum: u64,

    /// Sum of all decrements.
    pub decrement_sum: u64,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub note: Option<String>,

    /// Unix millis of the first use, `0` if never used.
    pub first_usage: u64,

    /// Unix millis of the last use, `0` if never used.
    pub last_usage: u64,
}

/// Snapshot of a stopwatch.
///
/// All durations are nanoseconds. `variance` is the sample variance
/// (`M2 / (n - 1)`), `variance_n` the population variance (`M2 / n`).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StopwatchSample {
    /// Canonical dotted name.
    pub name: String,

    /// Sum of all split durations.
    pub total: u64,

    /// Shortest split.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub min: Option<u64>,

    /// Longest split.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max: Option<u64>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub min_timestamp: Option<u64>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max_timestamp: Option<u64>,

    /// Splits currently running.
    pub active: u64,

    /// Highest number of concurrently running splits.
    pub max_active: u64,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max_active_timestamp: Option<u64>,

    /// Duration of the most recent split.
    pub last: u64,

    pub mean: f64,

    pub standard_deviation: f64,

    pub variance: f64,

    pub variance_n: f64,

    /// Number of completed splits.
    pub counter: u64,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub note: Option<String>,

    pub first_usage: u64,

    pub last_usage: u64,
}

impl StopwatchSample {
    /// Total as a presentable duration.
    pub fn total_duration(&self) -> Nanoseconds {
        Nanoseconds(self.total)
    }

    /// Last split as a presentable duration.
    pub fn last_duration(&self) -> Nanoseconds {
        Nanoseconds(self.last)
    }
}

/// Sample of any typed monitor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum Sample {
    Counter(CounterSample),
    Stopwatch(StopwatchSample),
}

impl Sample {
    /// Name of the sampled monitor.
    pub fn name(&self) -> &str {
        match self {
            Sample::Counter(c) => &c.name,
            Sample::Stopwatch(s) => &s.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_counter_sample_has_no_extrema() {
        let sample = CounterSample::default();
        assert_eq!(sample.counter, 0);
        assert!(sample.min.is_none());
        assert!(sample.max.is_none());
    }

    #[test]
    fn test_sample_name_dispatches() {
        let c = Sample::Counter(CounterSample {
            name: "a.b".into(),
            ..Default::default()
        });
        let s = Sample::Stopwatch(StopwatchSample {
            name: "a.c".into(),
            ..Default::default()
        });
        assert_eq!(c.name(), "a.b");
        assert_eq!(s.name(), "a.c");
    }

    #[test]
    fn test_stopwatch_durations() {
        let s = StopwatchSample {
            total: 2_000_000,
            last: 1_500,
            ..Default::default()
        };
        assert_eq!(s.total_duration().to_string(), "2.00 ms");
        assert_eq!(s.last_duration().as_nanos(), 1_500);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_absent_extrema_are_skipped() {
        let json = serde_json::to_value(CounterSample {
            name: "x".into(),
            ..Default::default()
        })
        .unwrap();
        assert!(json.get("min").is_none());
        assert_eq!(json["increment_sum"], 0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_tagged_sample_serialization() {
        let sample = Sample::Stopwatch(StopwatchSample {
            name: "sw".into(),
            counter: 2,
            ..Default::default()
        });
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["type"], "stopwatch");
        assert_eq!(json["counter"], 2);

        let back: Sample = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample);
    }
}
