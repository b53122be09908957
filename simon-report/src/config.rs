//! Reporter configuration, read from the `[report]` table of the registry's
//! configuration file.
//!
//! ```toml
//! [report]
//! interval_ms = 5000
//! counters_file = "counters.csv"
//! stopwatches_file = "stopwatches.csv"
//! separator = ";"
//! append = true
//! json_file = "simons.json"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use simon_core::{Clock, Manager};

use crate::csv::{CsvReporter, DEFAULT_COUNTERS_FILE, DEFAULT_STOPWATCHES_FILE};
use crate::error::{ReportError, Result};
use crate::output::Output;
use crate::reporter::Reporter;

/// Table holding the reporter settings.
pub const TABLE: &str = "report";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub interval_ms: u64,

    /// Disables the CSV output when false.
    pub csv: bool,
    pub counters_file: PathBuf,
    pub stopwatches_file: PathBuf,
    pub separator: String,
    pub append: bool,

    /// Adds a JSON file output when set.
    pub json_file: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            csv: true,
            counters_file: PathBuf::from(DEFAULT_COUNTERS_FILE),
            stopwatches_file: PathBuf::from(DEFAULT_STOPWATCHES_FILE),
            separator: ",".to_string(),
            append: false,
            json_file: None,
        }
    }
}

impl ReportConfig {
    /// Loads the `[report]` table of the file at `path`, with `SIMON_REPORT__*`
    /// environment overrides. A missing table yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = simon_core::config::layered(path.as_ref()).map_err(|err| match err {
            simon_core::Error::Config(err) => ReportError::Config(err),
            other => ReportError::Core(other),
        })?;
        Self::from_config(&config)
    }

    /// Parses TOML text, without environment overrides.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        match config.get::<ReportConfig>(TABLE) {
            Ok(report) => Ok(report),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn separator_char(&self) -> Result<char> {
        let mut chars = self.separator.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(ReportError::InvalidSeparator(self.separator.clone())),
        }
    }

    /// The outputs described by this configuration, timestamped by `clock`.
    pub fn outputs(&self, clock: Arc<dyn Clock>) -> Result<Vec<Output>> {
        let mut outputs = Vec::new();
        if self.csv {
            let reporter = CsvReporter::new()
                .counters_file(self.counters_file.clone())?
                .stopwatches_file(self.stopwatches_file.clone())?
                .separator(self.separator_char()?)
                .append(self.append)
                .clock(clock);
            outputs.push(Output::Csv(Arc::new(reporter)));
        }
        if let Some(path) = &self.json_file {
            outputs.push(Output::JsonFile(path.clone()));
        }
        Ok(outputs)
    }

    /// A reporter for `manager` with every configured output.
    pub fn reporter(&self, manager: Manager) -> Result<Reporter> {
        let builder = self
            .outputs(manager.clock())?
            .into_iter()
            .fold(Reporter::builder(), |builder, output| builder.output(output));
        Ok(builder.interval(self.interval()).build(manager))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_missing_table_gives_defaults() {
        let config = ReportConfig::from_toml("enabled = true\n").unwrap();
        assert_eq!(config, ReportConfig::default());
        assert_eq!(config.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_parses_report_table() {
        let config = ReportConfig::from_toml(
            r#"
            [report]
            interval_ms = 250
            counters_file = "c.csv"
            separator = ";"
            append = true
            json_file = "out.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.interval(), Duration::from_millis(250));
        assert_eq!(config.counters_file, PathBuf::from("c.csv"));
        assert_eq!(config.stopwatches_file, PathBuf::from("stopwatches.csv"));
        assert!(config.append);

        let outputs = config.outputs(Manager::new().clock()).unwrap();
        assert_eq!(outputs.len(), 2);
        match &outputs[0] {
            Output::Csv(csv) => {
                assert_eq!(csv.get_separator(), ';');
                assert!(csv.is_append());
            }
            other => panic!("expected csv output, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_separator() {
        let config = ReportConfig::from_toml("[report]\nseparator = \";;\"\n").unwrap();
        assert!(matches!(
            config.outputs(Manager::new().clock()),
            Err(ReportError::InvalidSeparator(_))
        ));
    }

    #[test]
    fn test_empty_path_rejected() {
        let config = ReportConfig::from_toml("[report]\ncounters_file = \"\"\n").unwrap();
        assert!(matches!(
            config.reporter(Manager::new()),
            Err(ReportError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_csv_can_be_disabled() {
        let config = ReportConfig::from_toml("[report]\ncsv = false\n").unwrap();
        let reporter = config.reporter(Manager::new()).unwrap();
        assert!(reporter.outputs().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[report]\ninterval_ms = 10000").unwrap();

        let config = ReportConfig::load(file.path()).unwrap();
        assert_eq!(config.interval(), Duration::from_secs(10));
    }
}
