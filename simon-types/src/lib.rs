//! # simon-types
//!
//! Plain data types shared by the simon monitor registry and anything that
//! consumes its output: reporters, serializers, dashboards.
//!
//! Nothing in here knows how monitors are stored or updated. These are the
//! immutable records handed out by `sample()` calls and the snapshot emitted
//! by the registry, so a consumer can depend on this crate alone.
//!
//! ## Features
//!
//! - `std` (default): Standard library support (wall-clock snapshot timestamps)
//! - `serde`: Serialization of every record via serde
//!
//! ## Example
//!
//! ```rust
//! use simon_types::{CounterSample, ManagerSnapshot, StopwatchSample};
//!
//! let snapshot = ManagerSnapshot::builder()
//!     .timestamp_ms(1_700_000_000_000)
//!     .counter(CounterSample {
//!         name: "app.requests".into(),
//!         counter: 42,
//!         increment_sum: 42,
//!         ..Default::default()
//!     })
//!     .stopwatch(StopwatchSample {
//!         name: "app.db.query".into(),
//!         counter: 3,
//!         total: 3_000_000,
//!         ..Default::default()
//!     })
//!     .build();
//!
//! assert_eq!(snapshot.len(), 2);
//! assert_eq!(snapshot.counter("app.requests").map(|c| c.counter), Some(42));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod buckets;
mod duration;
mod samples;
mod snapshot;
mod state;
mod version;

pub use buckets::*;
pub use duration::*;
pub use samples::*;
pub use snapshot::*;
pub use state::*;
pub use version::*;

/// Current schema version of samples and snapshots.
///
/// Increment this when making breaking changes to the sample field set.
pub const SCHEMA_VERSION: u32 = 1;
