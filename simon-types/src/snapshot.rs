//! ManagerSnapshot - a point-in-time view of every typed monitor.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::{CounterSample, SchemaVersion, StopwatchSample};

/// A point-in-time snapshot of all counters and stopwatches of a registry.
///
/// Each sample is individually coherent (taken under its monitor's lock);
/// there is no ordering guarantee across monitors.
///
/// # Example
///
/// ```rust
/// use simon_types::{CounterSample, ManagerSnapshot};
///
/// let snapshot = ManagerSnapshot::builder()
///     .counter(CounterSample { name: "jobs.queued".into(), counter: 3, ..Default::default() })
///     .build();
///
/// assert!(snapshot.stopwatches.is_empty());
/// // let json = serde_json::to_string(&snapshot)?; // with the "serde" feature
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManagerSnapshot {
    /// Schema version for forward compatibility.
    pub version: SchemaVersion,

    /// Unix timestamp in milliseconds when this snapshot was taken.
    pub timestamp_ms: u64,

    /// Counter samples keyed by monitor name.
    pub counters: BTreeMap<String, CounterSample>,

    /// Stopwatch samples keyed by monitor name.
    pub stopwatches: BTreeMap<String, StopwatchSample>,
}

impl ManagerSnapshot {
    /// Create an empty snapshot with a specific timestamp.
    pub fn with_timestamp(timestamp_ms: u64) -> Self {
        Self {
            version: SchemaVersion::current(),
            timestamp_ms,
            counters: BTreeMap::new(),
            stopwatches: BTreeMap::new(),
        }
    }

    /// Create a builder for constructing snapshots.
    pub fn builder() -> ManagerSnapshotBuilder {
        ManagerSnapshotBuilder::new()
    }

    /// Check if the snapshot holds no samples.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.stopwatches.is_empty()
    }

    /// Number of samples in the snapshot.
    pub fn len(&self) -> usize {
        self.counters.len() + self.stopwatches.len()
    }

    pub fn counter(&self, name: &str) -> Option<&CounterSample> {
        self.counters.get(name)
    }

    pub fn stopwatch(&self, name: &str) -> Option<&StopwatchSample> {
        self.stopwatches.get(name)
    }
}

/// Builder for constructing `ManagerSnapshot` instances.
#[derive(Debug, Default)]
pub struct ManagerSnapshotBuilder {
    timestamp_ms: Option<u64>,
    counters: BTreeMap<String, CounterSample>,
    stopwatches: BTreeMap<String, StopwatchSample>,
}

impl ManagerSnapshotBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a specific timestamp (milliseconds since Unix epoch).
    pub fn timestamp_ms(mut self, ts: u64) -> Self {
        self.timestamp_ms = Some(ts);
        self
    }

    /// Add a counter sample, replacing any previous sample of that name.
    pub fn counter(mut self, sample: CounterSample) -> Self {
        self.counters.insert(sample.name.clone(), sample);
        self
    }

    /// Add a stopwatch sample, replacing any previous sample of that name.
    pub fn stopwatch(mut self, sample: StopwatchSample) -> Self {
        self.stopwatches.insert(sample.name.clone(), sample);
        self
    }

    /// Build the snapshot.
    #[cfg(feature = "std")]
    pub fn build(self) -> ManagerSnapshot {
        ManagerSnapshot {
            version: SchemaVersion::current(),
            timestamp_ms: self.timestamp_ms.unwrap_or_else(current_timestamp_ms),
            counters: self.counters,
            stopwatches: self.stopwatches,
        }
    }

    /// Build the snapshot with a specific timestamp (for no_std).
    #[cfg(not(feature = "std"))]
    pub fn build(self) -> ManagerSnapshot {
        ManagerSnapshot {
            version: SchemaVersion::current(),
            timestamp_ms: self.timestamp_ms.unwrap_or(0),
            counters: self.counters,
            stopwatches: self.stopwatches,
        }
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
#[cfg(feature = "std")]
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_samples() {
        let snapshot = ManagerSnapshot::builder()
            .timestamp_ms(1703160000000)
            .counter(CounterSample {
                name: "c".into(),
                counter: 5,
                ..Default::default()
            })
            .stopwatch(StopwatchSample {
                name: "s".into(),
                counter: 2,
                ..Default::default()
            })
            .build();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.timestamp_ms, 1703160000000);
        assert_eq!(snapshot.counter("c").unwrap().counter, 5);
        assert_eq!(snapshot.stopwatch("s").unwrap().counter, 2);
        assert!(snapshot.counter("s").is_none());
    }

    #[test]
    fn test_later_sample_replaces_earlier() {
        let snapshot = ManagerSnapshot::builder()
            .counter(CounterSample {
                name: "c".into(),
                counter: 1,
                ..Default::default()
            })
            .counter(CounterSample {
                name: "c".into(),
                counter: 2,
                ..Default::default()
            })
            .build();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.counter("c").unwrap().counter, 2);
    }

    #[test]
    fn test_empty_snapshot_is_versioned() {
        let snapshot = ManagerSnapshot::with_timestamp(0);
        assert!(snapshot.is_empty());
        assert!(snapshot.version.is_compatible());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let snapshot = ManagerSnapshot::builder()
            .timestamp_ms(1703160000000)
            .stopwatch(StopwatchSample {
                name: "db.query".into(),
                total: 10,
                min: Some(4),
                max: Some(6),
                counter: 2,
                mean: 5.0,
                ..Default::default()
            })
            .build();

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: ManagerSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(snapshot, parsed);
    }
}
