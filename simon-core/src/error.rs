//! Error types for the monitor registry.

use simon_types::SimonKind;
use thiserror::Error;

/// Errors surfaced to callers of the registry.
///
/// Measurement paths never fail: only programmer errors (bad names, wrong
/// types) and explicitly requested queries return these.
#[derive(Debug, Error)]
pub enum Error {
    /// Name is empty, has empty segments, or contains non-printable characters.
    #[error("invalid monitor name: {0:?}")]
    BadName(String),

    /// Typed access to a name already bound to another type.
    #[error("monitor {name:?} is a {existing}, requested as {requested}")]
    TypeConflict {
        name: String,
        existing: SimonKind,
        requested: SimonKind,
    },

    /// A quantile was requested before enough values were recorded.
    #[error("not enough samples for a quantile: {count} recorded, {required} required")]
    NotEnoughSamples { count: u64, required: u64 },

    /// Quantile ratio outside the open interval (0, 1).
    #[error("quantile ratio must lie strictly between 0 and 1, got {0}")]
    InvalidQuantile(f64),

    /// Histogram bounds or bucket count are unusable.
    #[error("invalid buckets: min {min} must be below max {max} with at least one bucket (got {count})")]
    InvalidBuckets { min: u64, max: u64, count: usize },

    /// A callback panicked while handling an event.
    ///
    /// Only ever handed to other callbacks through `on_warning`.
    #[error("callback failed: {message}")]
    ListenerFailure { message: String },

    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_problem() {
        let err = Error::TypeConflict {
            name: "x".into(),
            existing: SimonKind::Counter,
            requested: SimonKind::Stopwatch,
        };
        assert_eq!(err.to_string(), "monitor \"x\" is a counter, requested as stopwatch");

        let err = Error::NotEnoughSamples {
            count: 3,
            required: 20,
        };
        assert!(err.to_string().contains("3 recorded"));
    }
}
