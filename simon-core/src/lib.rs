//! # simon-core
//!
//! In-process performance monitoring with named, hierarchical monitors.
//!
//! Applications obtain counters and stopwatches by dotted name from a
//! [`Manager`], record against them from any thread, and read samples back
//! or let callbacks (loggers, quantile estimators, reporters) consume the
//! event stream.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use simon_core::{Manager, TracingCallback};
//!
//! let manager = Manager::builder()
//!     .callback(Arc::new(TracingCallback::new()))
//!     .build();
//!
//! let requests = manager.get_counter("web.requests").unwrap();
//! let latency = manager.get_stopwatch("web.latency").unwrap();
//!
//! requests.increment();
//! let mut split = latency.start();
//! // ... handle the request ...
//! split.stop();
//!
//! let snapshot = manager.collect();
//! assert_eq!(snapshot.counter("web.requests").unwrap().counter, 1);
//! assert_eq!(snapshot.stopwatch("web.latency").unwrap().counter, 1);
//! ```
//!
//! ## Features
//!
//! - **Hierarchical state**: disable `web` and everything below it follows
//! - **Consistent samples**: each sample is taken under the monitor's lock
//! - **Callbacks**: every change is fanned out to attached callbacks in order
//! - **Quantiles**: bucketed histograms with fixed or learned bounds
//! - **Zero cost when off**: a disabled manager hands out null monitors

mod callback;
pub mod clock;
pub mod config;
mod counter;
mod error;
mod manager;
mod name;
mod node;
pub mod quantiles;
mod simon;
mod stopwatch;

pub use callback::{Callback, CompositeCallback, TracingCallback};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::{ManagerConfig, QuantilesConfig, SimonRule};
pub use counter::Counter;
pub use error::{Error, Result};
pub use manager::{manager, Manager, ManagerBuilder};
pub use name::{validate as validate_name, SimonPattern, ROOT_NAME, SEPARATOR};
pub use simon::Simon;
pub use stopwatch::{Split, Stopwatch};

// Re-export types for convenience
pub use simon_types::{
    BucketsSample, CounterSample, ManagerSnapshot, Nanoseconds, OutOfRange, QuantileEstimate,
    Sample, SimonKind, SimonState, StopwatchSample,
};
