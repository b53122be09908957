//! Example: Periodic CSV reporting
//!
//! Simulates a small request handler instrumented with a counter and a
//! stopwatch, reports both to CSV files every second and estimates latency
//! percentiles with an auto-tuned quantiles callback.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=simon=debug cargo run -p simon-report --example csv_report
//! ```

use std::sync::Arc;
use std::time::Duration;

use simon_core::quantiles::QuantilesCallback;
use simon_core::{Manager, TracingCallback};
use simon_report::{CsvReporter, Output, Reporter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let manager = Manager::builder()
        .callback(Arc::new(TracingCallback::new()))
        .callback(Arc::new(QuantilesCallback::auto()))
        .build();

    let dir = std::env::temp_dir();
    let csv = CsvReporter::new()
        .counters_file(dir.join("simon-counters.csv"))?
        .stopwatches_file(dir.join("simon-stopwatches.csv"))?
        .separator(';');
    println!("Writing CSV files to {}", dir.display());

    let (channel, mut snapshots) = Output::channel(8);
    let reporter = Reporter::builder()
        .output(Output::csv(csv))
        .output(channel)
        .interval(Duration::from_secs(1))
        .build(manager.clone());
    let handle = reporter.start().await?;

    let requests = manager.get_counter("demo.requests")?;
    let latency = manager.get_stopwatch("demo.latency")?;

    for i in 0..50u64 {
        requests.increment();
        let mut split = latency.start();
        tokio::time::sleep(Duration::from_millis(20 + (i * 7) % 40)).await;
        split.stop();
    }

    while let Ok(snapshot) = snapshots.try_recv() {
        if let Some(sample) = snapshot.stopwatch("demo.latency") {
            println!(
                "{} splits, mean {}",
                sample.counter,
                simon_core::Nanoseconds(sample.mean as u64)
            );
        }
    }

    if let Some(buckets) = QuantilesCallback::sample_buckets(&latency) {
        for percentile in &buckets.percentiles {
            if let Some(estimate) = percentile.estimate {
                println!(
                    "p{}: {}",
                    percentile.percentile,
                    simon_core::Nanoseconds(estimate.value as u64)
                );
            }
        }
    }

    handle.stop().await;
    Ok(())
}
