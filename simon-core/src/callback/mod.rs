//! Lifecycle callbacks and the composite that fans events out to them.
//!
//! Every registry owns one [`CompositeCallback`]. Monitors dispatch their
//! events to it while holding their own lock, so all events of one monitor
//! arrive in mutation order. The monitor lock is re-entrant: a callback may
//! sample or touch the monitor that raised the event.

mod logging;

pub use logging::TracingCallback;

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use simon_types::{CounterSample, StopwatchSample};
use tracing::warn;

use crate::counter::Counter;
use crate::error::Error;
use crate::manager::Manager;
use crate::simon::Simon;
use crate::stopwatch::{Split, Stopwatch};

/// Observer of registry and monitor events.
///
/// Every method has an empty default, implement only what you need.
/// Callbacks must be cheap: they run on the caller's measurement path.
pub trait Callback: Send + Sync {
    /// The callback was attached to `manager`.
    fn on_manager_start(&self, _manager: &Manager) {}

    /// The callback was detached or the manager shut down.
    fn on_manager_stop(&self) {}

    /// A monitor was created or promoted to a counter/stopwatch.
    fn on_simon_created(&self, _simon: &Simon) {}

    /// A monitor was removed from the registry.
    fn on_simon_destroyed(&self, _simon: &Simon) {}

    fn on_simon_reset(&self, _simon: &Simon) {}

    fn on_stopwatch_start(&self, _split: &Split) {}

    fn on_stopwatch_stop(&self, _split: &Split, _sample: &StopwatchSample) {}

    /// A pre-measured split was added with `Stopwatch::add`.
    fn on_stopwatch_add(&self, _stopwatch: &Stopwatch, _split: &Split, _sample: &StopwatchSample) {}

    fn on_counter_increase(&self, _counter: &Counter, _inc: u64, _sample: &CounterSample) {}

    fn on_counter_decrease(&self, _counter: &Counter, _dec: u64, _sample: &CounterSample) {}

    fn on_counter_set(&self, _counter: &Counter, _value: i64, _sample: &CounterSample) {}

    fn on_message(&self, _message: &str) {}

    fn on_warning(&self, _warning: &str, _cause: Option<&(dyn StdError + 'static)>) {}
}

type CallbackList = Arc<Vec<Arc<dyn Callback>>>;

/// Ordered list of callbacks, itself a [`Callback`].
///
/// The list is copy-on-write: dispatch works on a snapshot, so callbacks may
/// attach or detach callbacks while handling an event. A callback that
/// panics is logged and reported to the others through `on_warning`; the
/// remaining callbacks still receive the event.
#[derive(Default)]
pub struct CompositeCallback {
    callbacks: RwLock<CallbackList>,
}

impl CompositeCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a callback. It receives events after all earlier ones.
    pub fn add(&self, callback: Arc<dyn Callback>) {
        let mut callbacks = self.callbacks.write();
        let mut next = Vec::with_capacity(callbacks.len() + 1);
        next.extend(callbacks.iter().cloned());
        next.push(callback);
        *callbacks = Arc::new(next);
    }

    /// Removes a previously added callback. Returns `false` if it was not attached.
    pub fn remove(&self, callback: &Arc<dyn Callback>) -> bool {
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        let next: Vec<_> = callbacks
            .iter()
            .filter(|c| !same_callback(c, callback))
            .cloned()
            .collect();
        let removed = next.len() != before;
        *callbacks = Arc::new(next);
        removed
    }

    /// Removes every callback and returns them in registration order.
    pub fn clear(&self) -> Vec<Arc<dyn Callback>> {
        let taken = std::mem::take(&mut *self.callbacks.write());
        taken.iter().cloned().collect()
    }

    /// Snapshot of the attached callbacks in registration order.
    pub fn callbacks(&self) -> Vec<Arc<dyn Callback>> {
        self.snapshot().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    fn snapshot(&self) -> CallbackList {
        self.callbacks.read().clone()
    }

    fn dispatch(&self, event: &'static str, f: impl Fn(&dyn Callback)) {
        let callbacks = self.snapshot();
        for (index, callback) in callbacks.iter().enumerate() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(callback.as_ref()))) {
                let message = format!("callback panicked in {}: {}", event, panic_message(&payload));
                warn!(event, %message, "callback failure");
                notify_failure(&callbacks, index, message);
            }
        }
    }
}

impl fmt::Debug for CompositeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeCallback")
            .field("callbacks", &self.len())
            .finish()
    }
}

fn same_callback(a: &Arc<dyn Callback>, b: &Arc<dyn Callback>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Reports a failed callback to every other callback. Failures while
/// reporting are only logged.
fn notify_failure(callbacks: &[Arc<dyn Callback>], failed: usize, message: String) {
    let cause = Error::ListenerFailure { message };
    let text = cause.to_string();
    for (index, callback) in callbacks.iter().enumerate() {
        if index == failed {
            continue;
        }
        let delivered = catch_unwind(AssertUnwindSafe(|| callback.on_warning(&text, Some(&cause))));
        if delivered.is_err() {
            warn!(%text, "callback panicked while handling a callback failure");
        }
    }
}

impl Callback for CompositeCallback {
    fn on_manager_start(&self, manager: &Manager) {
        self.dispatch("on_manager_start", |c| c.on_manager_start(manager));
    }

    fn on_manager_stop(&self) {
        self.dispatch("on_manager_stop", |c| c.on_manager_stop());
    }

    fn on_simon_created(&self, simon: &Simon) {
        self.dispatch("on_simon_created", |c| c.on_simon_created(simon));
    }

    fn on_simon_destroyed(&self, simon: &Simon) {
        self.dispatch("on_simon_destroyed", |c| c.on_simon_destroyed(simon));
    }

    fn on_simon_reset(&self, simon: &Simon) {
        self.dispatch("on_simon_reset", |c| c.on_simon_reset(simon));
    }

    fn on_stopwatch_start(&self, split: &Split) {
        self.dispatch("on_stopwatch_start", |c| c.on_stopwatch_start(split));
    }

    fn on_stopwatch_stop(&self, split: &Split, sample: &StopwatchSample) {
        self.dispatch("on_stopwatch_stop", |c| c.on_stopwatch_stop(split, sample));
    }

    fn on_stopwatch_add(&self, stopwatch: &Stopwatch, split: &Split, sample: &StopwatchSample) {
        self.dispatch("on_stopwatch_add", |c| c.on_stopwatch_add(stopwatch, split, sample));
    }

    fn on_counter_increase(&self, counter: &Counter, inc: u64, sample: &CounterSample) {
        self.dispatch("on_counter_increase", |c| c.on_counter_increase(counter, inc, sample));
    }

    fn on_counter_decrease(&self, counter: &Counter, dec: u64, sample: &CounterSample) {
        self.dispatch("on_counter_decrease", |c| c.on_counter_decrease(counter, dec, sample));
    }

    fn on_counter_set(&self, counter: &Counter, value: i64, sample: &CounterSample) {
        self.dispatch("on_counter_set", |c| c.on_counter_set(counter, value, sample));
    }

    fn on_message(&self, message: &str) {
        self.dispatch("on_message", |c| c.on_message(message));
    }

    fn on_warning(&self, warning: &str, cause: Option<&(dyn StdError + 'static)>) {
        self.dispatch("on_warning", |c| c.on_warning(warning, cause));
    }
}
