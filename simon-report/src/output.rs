//! Output backends for emitting snapshots.

use std::path::PathBuf;
use std::sync::Arc;

use simon_types::ManagerSnapshot;
use tokio::sync::mpsc;

use crate::csv::CsvReporter;
use crate::error::Result;

/// Output destination for snapshots.
#[derive(Debug)]
pub enum Output {
    /// Append the samples of each snapshot to CSV files.
    ///
    /// File I/O runs on tokio's blocking pool.
    Csv(Arc<CsvReporter>),

    /// Write snapshots to a JSON file.
    ///
    /// The file is overwritten with each snapshot.
    JsonFile(PathBuf),

    /// Send snapshots through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    Channel(mpsc::Sender<ManagerSnapshot>),
}

impl Output {
    pub fn csv(reporter: CsvReporter) -> Self {
        Output::Csv(Arc::new(reporter))
    }

    /// Create a JSON file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use simon_report::Output;
    ///
    /// let output = Output::json_file("simons.json");
    /// ```
    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        Output::JsonFile(path.into())
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// # Example
    ///
    /// ```rust
    /// use simon_core::Manager;
    /// use simon_report::{Output, Reporter};
    ///
    /// # tokio_test::block_on(async {
    /// let manager = Manager::new();
    /// manager.get_counter("orders.new").unwrap().increment();
    ///
    /// let (output, mut rx) = Output::channel(16);
    /// let reporter = Reporter::builder().output(output).build(manager);
    /// reporter.emit_now().await;
    ///
    /// let snapshot = rx.recv().await.unwrap();
    /// assert_eq!(snapshot.counter("orders.new").unwrap().counter, 1);
    /// # });
    /// ```
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ManagerSnapshot>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Prepares the output for a run of emissions.
    pub(crate) async fn open(&self) -> Result<()> {
        match self {
            Output::Csv(reporter) => {
                let reporter = reporter.clone();
                tokio::task::spawn_blocking(move || reporter.on_start()).await?
            }
            Output::JsonFile(_) | Output::Channel(_) => Ok(()),
        }
    }

    /// Emit a snapshot to this output.
    pub(crate) async fn emit(&self, snapshot: &ManagerSnapshot) -> Result<()> {
        match self {
            Output::Csv(reporter) => {
                let reporter = reporter.clone();
                let stopwatches: Vec<_> = snapshot.stopwatches.values().cloned().collect();
                let counters: Vec<_> = snapshot.counters.values().cloned().collect();
                tokio::task::spawn_blocking(move || reporter.report(&stopwatches, &counters))
                    .await??;
            }
            Output::JsonFile(path) => {
                let json = serde_json::to_string_pretty(snapshot)?;
                tokio::fs::write(path, json).await?;
            }
            Output::Channel(tx) => {
                // Best effort, a full channel drops the snapshot
                if tx.try_send(snapshot.clone()).is_err() {
                    tracing::trace!("snapshot channel full or closed, dropping snapshot");
                }
            }
        }
        Ok(())
    }

    pub(crate) async fn close(&self) -> Result<()> {
        match self {
            Output::Csv(reporter) => {
                let reporter = reporter.clone();
                tokio::task::spawn_blocking(move || reporter.on_stop()).await?
            }
            Output::JsonFile(_) | Output::Channel(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use simon_core::Manager;

    use super::*;
    use crate::error::ReportError;

    #[tokio::test(flavor = "current_thread")]
    async fn test_csv_writes_off_the_runtime_thread() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = CsvReporter::new()
            .counters_file(dir.path().join("c.csv"))
            .unwrap()
            .stopwatches_file(dir.path().join("s.csv"))
            .unwrap();
        let output = Output::csv(reporter);

        let manager = Manager::new();
        manager.get_counter("jobs").unwrap().increase(2);

        output.open().await.unwrap();
        output.emit(&manager.collect()).await.unwrap();
        output.close().await.unwrap();

        let Output::Csv(csv) = &output else {
            unreachable!()
        };
        assert!(!csv.is_open());
        let written = std::fs::read_to_string(dir.path().join("c.csv")).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.lines().nth(1).unwrap().contains("\"jobs\",2,"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_csv_open_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = CsvReporter::new()
            .counters_file(dir.path().join("missing").join("c.csv"))
            .unwrap();

        let err = Output::csv(reporter).open().await.unwrap_err();
        assert!(matches!(err, ReportError::Io(_)));
    }
}
