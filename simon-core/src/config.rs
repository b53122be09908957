//! Registry configuration.
//!
//! Loaded with the `config` crate from a file, with `SIMON_` prefixed
//! environment variables layered on top:
//!
//! ```toml
//! enabled = true
//!
//! [[simons]]
//! pattern = "app.db.*"
//! state = "disabled"
//!
//! [quantiles]
//! kind = "auto"
//! warmup = 20
//! target_buckets = 8
//! rounding = "power_of_two"
//! ```

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use simon_types::SimonState;

use crate::error::Result;
use crate::name::SimonPattern;
use crate::quantiles::{
    AutoBucketBuilder, BoundsRounding, FixedBucketBuilder, QuantilesCallback,
};

/// Prefix of environment variables overriding file settings.
pub const ENV_PREFIX: &str = "SIMON";

/// Builds the layered configuration source for `path`.
///
/// Other components read their own tables from the same source.
pub fn layered(path: &Path) -> Result<Config> {
    let config = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    Ok(config)
}

/// Settings for a [`Manager`](crate::Manager).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Registry-wide switch.
    pub enabled: bool,

    /// State rules for new monitors. The last matching rule wins.
    pub simons: Vec<SimonRule>,

    /// Installs a quantiles callback when present.
    pub quantiles: Option<QuantilesConfig>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            simons: Vec::new(),
            quantiles: None,
        }
    }
}

/// Explicit state for every monitor whose name matches `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimonRule {
    pub pattern: String,
    pub state: SimonState,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuantilesConfig {
    Fixed {
        min: u64,
        max: u64,
        buckets: usize,
    },
    Auto {
        #[serde(default = "default_warmup")]
        warmup: usize,
        #[serde(default = "default_target_buckets")]
        target_buckets: usize,
        #[serde(default)]
        rounding: BoundsRounding,
    },
}

fn default_warmup() -> usize {
    AutoBucketBuilder::DEFAULT_WARMUP
}

fn default_target_buckets() -> usize {
    AutoBucketBuilder::DEFAULT_TARGET_BUCKETS
}

impl QuantilesConfig {
    /// The callback implementing this configuration.
    pub fn callback(&self) -> Result<QuantilesCallback> {
        Ok(match *self {
            QuantilesConfig::Fixed { min, max, buckets } => {
                QuantilesCallback::new(FixedBucketBuilder::new(min, max, buckets)?)
            }
            QuantilesConfig::Auto {
                warmup,
                target_buckets,
                rounding,
            } => QuantilesCallback::new(
                AutoBucketBuilder::new()
                    .warmup(warmup)
                    .target_buckets(target_buckets)
                    .rounding(rounding),
            ),
        })
    }
}

impl ManagerConfig {
    /// Loads the file at `path`, then applies `SIMON_*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(&layered(path.as_ref())?)
    }

    /// Parses TOML text, without environment overrides.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(config.clone().try_deserialize()?)
    }

    /// Compiled state rules, in declaration order.
    pub(crate) fn rules(&self) -> Vec<(SimonPattern, SimonState)> {
        self.simons
            .iter()
            .map(|rule| (SimonPattern::new(rule.pattern.as_str()), rule.state))
            .collect()
    }
}
