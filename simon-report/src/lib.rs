//! # simon-report
//!
//! Reporters for the simon monitor registry: CSV files, a JSON snapshot
//! file, or a channel, fed periodically from a background tokio task.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use simon_core::Manager;
//! use simon_report::{CsvReporter, Output, Reporter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), simon_report::ReportError> {
//!     let manager = Manager::new();
//!
//!     // Write counters.csv and stopwatches.csv every five seconds
//!     let reporter = Reporter::builder()
//!         .output(Output::csv(CsvReporter::new().separator(';')))
//!         .interval(Duration::from_secs(5))
//!         .build(manager.clone());
//!     let handle = reporter.start().await?;
//!
//!     let mut split = manager.get_stopwatch("app.startup")?.start();
//!     // ... your application runs ...
//!     split.stop();
//!
//!     // Flush and close the files
//!     handle.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **CSV**: one line per sample, stable column order
//! - **JSON**: pretty-printed snapshot, overwritten each tick
//! - **Channel**: hand snapshots to your own consumer
//! - **Config**: outputs and interval from the `[report]` table

pub mod config;
mod csv;
mod error;
mod output;
mod reporter;

pub use config::ReportConfig;
pub use csv::{CsvReporter, DEFAULT_COUNTERS_FILE, DEFAULT_SEPARATOR, DEFAULT_STOPWATCHES_FILE};
pub use error::{ReportError, Result};
pub use output::Output;
pub use reporter::{Reporter, ReporterBuilder, ReportingHandle};

// Re-export types for convenience
pub use simon_types::{CounterSample, ManagerSnapshot, StopwatchSample};
