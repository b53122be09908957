//! CSV reporter writing one file for counters and one for stopwatches.
//!
//! Every report appends one line per sample, prefixed with the reporter's
//! clock time in Unix millis:
//!
//! ```text
//! time,name,total,min,max,minTimestamp,maxTimestamp,incrementSum,decrementSum
//! 1700000000000,"web.requests",12,0,12,1699999990000,1700000000000,12,0
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use simon_core::{Clock, SystemClock};
use simon_types::{CounterSample, StopwatchSample};

use crate::error::{ReportError, Result};

pub const DEFAULT_COUNTERS_FILE: &str = "counters.csv";
pub const DEFAULT_STOPWATCHES_FILE: &str = "stopwatches.csv";
pub const DEFAULT_SEPARATOR: char = ',';

const COUNTER_FIELDS: [&str; 9] = [
    "time",
    "name",
    "total",
    "min",
    "max",
    "minTimestamp",
    "maxTimestamp",
    "incrementSum",
    "decrementSum",
];

const STOPWATCH_FIELDS: [&str; 15] = [
    "time",
    "name",
    "total",
    "min",
    "max",
    "minTimestamp",
    "maxTimestamp",
    "active",
    "maxActive",
    "maxActiveTimestamp",
    "last",
    "mean",
    "stdDev",
    "variance",
    "varianceN",
];

#[derive(Debug)]
struct Writers {
    counters: BufWriter<File>,
    stopwatches: BufWriter<File>,
}

/// Writes counter and stopwatch samples as CSV lines.
///
/// Files are opened by [`on_start`](Self::on_start) (or lazily by the first
/// report) and closed by [`on_stop`](Self::on_stop). Without append mode each
/// start truncates the files; with it, lines are added after existing content
/// and the header is only written into empty files.
///
/// # Example
///
/// ```rust,no_run
/// use simon_report::CsvReporter;
///
/// let reporter = CsvReporter::new()
///     .counters_file("/tmp/counters.csv")?
///     .separator(';')
///     .append(true);
///
/// reporter.on_start()?;
/// reporter.report(&[], &[])?;
/// reporter.on_stop()?;
/// # Ok::<(), simon_report::ReportError>(())
/// ```
#[derive(Debug)]
pub struct CsvReporter {
    counters_file: PathBuf,
    stopwatches_file: PathBuf,
    separator: char,
    append: bool,
    clock: Arc<dyn Clock>,
    writers: Mutex<Option<Writers>>,
}

impl CsvReporter {
    /// A reporter with default file names, `,` as separator and truncating files.
    pub fn new() -> Self {
        Self {
            counters_file: PathBuf::from(DEFAULT_COUNTERS_FILE),
            stopwatches_file: PathBuf::from(DEFAULT_STOPWATCHES_FILE),
            separator: DEFAULT_SEPARATOR,
            append: false,
            clock: Arc::new(SystemClock::new()),
            writers: Mutex::new(None),
        }
    }

    pub fn counters_file(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        self.counters_file = non_empty(path.into(), "counters file")?;
        Ok(self)
    }

    pub fn stopwatches_file(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        self.stopwatches_file = non_empty(path.into(), "stopwatches file")?;
        Ok(self)
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Time source for the `time` column.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn get_counters_file(&self) -> &Path {
        &self.counters_file
    }

    pub fn get_stopwatches_file(&self) -> &Path {
        &self.stopwatches_file
    }

    pub fn get_separator(&self) -> char {
        self.separator
    }

    pub fn is_append(&self) -> bool {
        self.append
    }

    /// True between `on_start` and `on_stop`.
    pub fn is_open(&self) -> bool {
        self.writers.lock().is_some()
    }

    /// Opens both files and writes headers where needed.
    ///
    /// Calling it again while open is a no-op.
    pub fn on_start(&self) -> Result<()> {
        let mut writers = self.writers.lock();
        if writers.is_none() {
            *writers = Some(self.open()?);
        }
        Ok(())
    }

    /// Writes one line per sample to the matching file and flushes both.
    pub fn report(
        &self,
        stopwatches: &[StopwatchSample],
        counters: &[CounterSample],
    ) -> Result<()> {
        let time = self.clock.millis();
        let mut guard = self.writers.lock();
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        let Some(writers) = guard.as_mut() else {
            return Ok(());
        };

        for sample in counters {
            writeln!(writers.counters, "{}", self.counter_line(time, sample))?;
        }
        for sample in stopwatches {
            writeln!(writers.stopwatches, "{}", self.stopwatch_line(time, sample))?;
        }
        writers.counters.flush()?;
        writers.stopwatches.flush()?;
        Ok(())
    }

    /// Flushes and closes both files.
    pub fn on_stop(&self) -> Result<()> {
        if let Some(mut writers) = self.writers.lock().take() {
            writers.counters.flush()?;
            writers.stopwatches.flush()?;
        }
        Ok(())
    }

    fn open(&self) -> Result<Writers> {
        Ok(Writers {
            counters: open_csv(&self.counters_file, self.append, &self.header(&COUNTER_FIELDS))?,
            stopwatches: open_csv(
                &self.stopwatches_file,
                self.append,
                &self.header(&STOPWATCH_FIELDS),
            )?,
        })
    }

    fn header(&self, fields: &[&str]) -> String {
        fields.join(&self.separator.to_string())
    }

    fn counter_line(&self, time: u64, sample: &CounterSample) -> String {
        [
            time.to_string(),
            quoted(&sample.name),
            sample.counter.to_string(),
            optional(sample.min),
            optional(sample.max),
            optional(sample.min_timestamp),
            optional(sample.max_timestamp),
            sample.increment_sum.to_string(),
            sample.decrement_sum.to_string(),
        ]
        .join(&self.separator.to_string())
    }

    fn stopwatch_line(&self, time: u64, sample: &StopwatchSample) -> String {
        [
            time.to_string(),
            quoted(&sample.name),
            sample.total.to_string(),
            optional(sample.min),
            optional(sample.max),
            optional(sample.min_timestamp),
            optional(sample.max_timestamp),
            sample.active.to_string(),
            sample.max_active.to_string(),
            optional(sample.max_active_timestamp),
            sample.last.to_string(),
            float(sample.mean),
            float(sample.standard_deviation),
            float(sample.variance),
            float(sample.variance_n),
        ]
        .join(&self.separator.to_string())
    }
}

impl Default for CsvReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(path: PathBuf, what: &'static str) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(ReportError::InvalidPath(what));
    }
    Ok(path)
}

fn open_csv(path: &Path, append: bool, header: &str) -> io::Result<BufWriter<File>> {
    let file = if append {
        OpenOptions::new().create(true).append(true).open(path)?
    } else {
        File::create(path)?
    };
    let empty = file.metadata()?.len() == 0;
    let mut writer = BufWriter::new(file);
    if empty {
        writeln!(writer, "{header}")?;
    }
    Ok(writer)
}

fn quoted(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// Debug formatting keeps the decimal point on whole numbers: 8.0, not 8.
fn float(value: f64) -> String {
    format!("{value:?}")
}
