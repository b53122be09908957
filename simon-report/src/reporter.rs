//! Periodic emission of registry snapshots.

use std::sync::Arc;
use std::time::Duration;

use simon_core::Manager;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::output::Output;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Collects snapshots from a [`Manager`] and emits them to outputs.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use simon_core::Manager;
/// use simon_report::{CsvReporter, Output, Reporter};
///
/// #[tokio::main]
/// async fn main() -> Result<(), simon_report::ReportError> {
///     let manager = Manager::new();
///     let reporter = Reporter::builder()
///         .output(Output::csv(CsvReporter::new()))
///         .output(Output::json_file("simons.json"))
///         .interval(Duration::from_secs(10))
///         .build(manager.clone());
///
///     let handle = reporter.start().await?;
///
///     manager.get_counter("jobs.done")?.increment();
///     tokio::time::sleep(Duration::from_secs(30)).await;
///
///     handle.stop().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Reporter {
    manager: Manager,
    outputs: Arc<Vec<Output>>,
    interval: Duration,
}

impl Reporter {
    /// A reporter without outputs, emitting every second.
    pub fn new(manager: Manager) -> Self {
        Self::builder().build(manager)
    }

    pub fn builder() -> ReporterBuilder {
        ReporterBuilder::new()
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Start background emission of snapshots.
    ///
    /// Opens every output, then spawns a tokio task that collects a snapshot
    /// each interval and emits it to all outputs. The first snapshot is emitted
    /// immediately. Must be called from within a tokio runtime.
    pub async fn start(&self) -> Result<ReportingHandle> {
        for output in self.outputs.iter() {
            output.open().await?;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let manager = self.manager.clone();
        let outputs = self.outputs.clone();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        tracing::trace!(outputs = outputs.len(), "emitting snapshot");
                        emit_all(&manager, &outputs).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            for output in outputs.iter() {
                if let Err(err) = output.close().await {
                    tracing::warn!(error = %err, "failed to close output");
                }
            }
        });

        Ok(ReportingHandle { stop_tx, task })
    }

    /// Emit a snapshot to all outputs immediately.
    pub async fn emit_now(&self) {
        emit_all(&self.manager, &self.outputs).await;
    }
}

async fn emit_all(manager: &Manager, outputs: &[Output]) {
    let snapshot = manager.collect();
    for output in outputs {
        if let Err(err) = output.emit(&snapshot).await {
            tracing::warn!(error = %err, "failed to emit snapshot");
        }
    }
}

/// Builder for configuring a [`Reporter`].
#[derive(Debug, Default)]
pub struct ReporterBuilder {
    outputs: Vec<Output>,
    interval: Option<Duration>,
}

impl ReporterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output destination.
    ///
    /// Multiple outputs can be added; snapshots will be emitted to all of them.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Set the emission interval. Defaults to 1 second.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn build(self, manager: Manager) -> Reporter {
        Reporter {
            manager,
            outputs: Arc::new(self.outputs),
            interval: self.interval.unwrap_or(DEFAULT_INTERVAL),
        }
    }
}

/// Handle for controlling background emission.
///
/// Dropping the handle also stops emission, without waiting for the outputs
/// to be closed.
#[derive(Debug)]
pub struct ReportingHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReportingHandle {
    /// Stops emission and waits until every output is closed.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "reporting task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_interval_is_one_second() {
        let reporter = Reporter::new(Manager::new());
        assert_eq!(reporter.interval(), Duration::from_secs(1));
        assert!(reporter.outputs().is_empty());
    }

    #[test]
    fn test_builder() {
        let (output, _rx) = Output::channel(4);
        let reporter = Reporter::builder()
            .output(output)
            .output(Output::json_file("snapshot.json"))
            .interval(Duration::from_millis(250))
            .build(Manager::new());

        assert_eq!(reporter.interval(), Duration::from_millis(250));
        assert_eq!(reporter.outputs().len(), 2);
    }

    #[tokio::test]
    async fn test_emit_now_sends_to_channel() {
        let manager = Manager::new();
        manager.get_counter("ticks").unwrap().increase(3);

        let (output, mut rx) = Output::channel(4);
        let reporter = Reporter::builder().output(output).build(manager);
        reporter.emit_now().await;

        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.counter("ticks").unwrap().counter, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_emission_until_stopped() {
        let manager = Manager::new();
        let (output, mut rx) = Output::channel(16);
        let reporter = Reporter::builder()
            .output(output)
            .interval(Duration::from_secs(5))
            .build(manager.clone());

        let handle = reporter.start().await.unwrap();
        // First tick fires immediately
        assert!(rx.recv().await.unwrap().is_empty());

        manager.get_stopwatch("work").unwrap().add(42);
        tokio::time::advance(Duration::from_secs(5)).await;
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.stopwatch("work").unwrap().total, 42);

        handle.stop().await;
        drop(reporter);
        assert!(rx.recv().await.is_none());
    }
}
