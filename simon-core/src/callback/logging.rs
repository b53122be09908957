//! A callback that turns monitor events into `tracing` events.

use std::error::Error as StdError;

use simon_types::{CounterSample, Nanoseconds, StopwatchSample};
use tracing::{debug, info, trace, warn};

use super::Callback;
use crate::counter::Counter;
use crate::simon::Simon;
use crate::stopwatch::{Split, Stopwatch};

/// Logs every event under the `simon::callback` target.
///
/// Measurements go out at `trace`, lifecycle changes at `debug`, messages
/// at `info` and warnings at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCallback;

impl TracingCallback {
    pub fn new() -> Self {
        Self
    }
}

impl Callback for TracingCallback {
    fn on_manager_stop(&self) {
        debug!(target: "simon::callback", "manager stopped");
    }

    fn on_simon_created(&self, simon: &Simon) {
        debug!(target: "simon::callback", name = simon.name(), kind = %simon.kind(), "monitor created");
    }

    fn on_simon_destroyed(&self, simon: &Simon) {
        debug!(target: "simon::callback", name = simon.name(), "monitor destroyed");
    }

    fn on_simon_reset(&self, simon: &Simon) {
        debug!(target: "simon::callback", name = simon.name(), "monitor reset");
    }

    fn on_stopwatch_start(&self, split: &Split) {
        trace!(target: "simon::callback", name = split.stopwatch().name(), "split started");
    }

    fn on_stopwatch_stop(&self, split: &Split, sample: &StopwatchSample) {
        trace!(
            target: "simon::callback",
            name = sample.name.as_str(),
            split = %Nanoseconds(split.running_for()),
            counter = sample.counter,
            active = sample.active,
            "split stopped"
        );
    }

    fn on_stopwatch_add(&self, _stopwatch: &Stopwatch, split: &Split, sample: &StopwatchSample) {
        trace!(
            target: "simon::callback",
            name = sample.name.as_str(),
            split = %Nanoseconds(split.running_for()),
            counter = sample.counter,
            "split added"
        );
    }

    fn on_counter_increase(&self, _counter: &Counter, inc: u64, sample: &CounterSample) {
        trace!(target: "simon::callback", name = sample.name.as_str(), inc, value = sample.counter, "counter increased");
    }

    fn on_counter_decrease(&self, _counter: &Counter, dec: u64, sample: &CounterSample) {
        trace!(target: "simon::callback", name = sample.name.as_str(), dec, value = sample.counter, "counter decreased");
    }

    fn on_counter_set(&self, _counter: &Counter, value: i64, sample: &CounterSample) {
        trace!(target: "simon::callback", name = sample.name.as_str(), value, "counter set");
    }

    fn on_message(&self, message: &str) {
        info!(target: "simon::callback", message);
    }

    fn on_warning(&self, warning: &str, cause: Option<&(dyn StdError + 'static)>) {
        match cause {
            Some(cause) => warn!(target: "simon::callback", warning, cause = %cause),
            None => warn!(target: "simon::callback", warning),
        }
    }
}
