//! The generic monitor handle.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use simon_types::{Sample, SimonKind, SimonState};
use tracing::warn;

use crate::callback::Callback;
use crate::counter::Counter;
use crate::manager::Manager;
use crate::name;
use crate::node::{Kind, Node};
use crate::stopwatch::Stopwatch;

/// Handle to a monitor of any kind.
///
/// Handles are cheap to clone and stay valid for the life of the monitor,
/// including after it is promoted from a generic node to a counter or
/// stopwatch. A handle without a node is the null monitor: a disabled
/// registry hands it out, and it ignores every operation.
///
/// # Example
///
/// ```rust
/// use simon_core::Manager;
/// use simon_types::SimonState;
///
/// let manager = Manager::new();
/// let app = manager.get_simon("app").unwrap();
/// let counter = manager.get_counter("app.requests").unwrap();
///
/// app.set_state(SimonState::Disabled, false);
/// counter.increment();
/// assert_eq!(counter.sample().unwrap().counter, 0);
/// ```
#[derive(Clone)]
pub struct Simon {
    pub(crate) node: Option<Arc<Node>>,
}

impl Simon {
    /// The null monitor.
    pub fn null() -> Self {
        Self { node: None }
    }

    pub(crate) fn from_node(node: Arc<Node>) -> Self {
        Self { node: Some(node) }
    }

    pub(crate) fn node(&self) -> Option<&Arc<Node>> {
        self.node.as_ref()
    }

    pub fn is_null(&self) -> bool {
        self.node.is_none()
    }

    /// Full dotted name. The root and the null monitor have an empty name.
    pub fn name(&self) -> &str {
        self.node.as_deref().map_or(name::ROOT_NAME, Node::name)
    }

    /// Last segment of the name.
    pub fn local_name(&self) -> &str {
        name::local_name(self.name())
    }

    pub fn is_root(&self) -> bool {
        self.node.as_deref().is_some_and(Node::is_root)
    }

    pub fn parent(&self) -> Option<Simon> {
        self.node.as_deref()?.parent().map(Simon::from_node)
    }

    /// Direct children in creation order.
    pub fn children(&self) -> Vec<Simon> {
        self.node
            .as_deref()
            .map(|node| node.children().into_iter().map(Simon::from_node).collect())
            .unwrap_or_default()
    }

    pub fn kind(&self) -> SimonKind {
        self.node.as_deref().map_or(SimonKind::Null, Node::kind)
    }

    /// The registry owning this monitor, if it is still alive.
    pub fn manager(&self) -> Option<Manager> {
        let node = self.node.as_deref()?;
        node.context.manager.upgrade().map(Manager::from_inner)
    }

    /// Explicit state. The null monitor reports `Disabled`.
    pub fn state(&self) -> SimonState {
        self.node
            .as_deref()
            .map_or(SimonState::Disabled, Node::explicit_state)
    }

    /// Sets the explicit state.
    ///
    /// With `cascade`, every descendant is reset to `Inherit` so the whole
    /// subtree follows this monitor. The root cannot inherit; asking it to is
    /// ignored.
    pub fn set_state(&self, state: SimonState, cascade: bool) {
        let Some(node) = self.node.as_deref() else {
            return;
        };
        if node.is_root() && state == SimonState::Inherit {
            warn!("the root monitor cannot inherit its state, ignoring");
            return;
        }

        let manager = node.context.manager.upgrade();
        let _serialized = manager.as_ref().map(|m| m.state_lock.lock());

        node.set_explicit_state(state);
        if cascade {
            node.inherit_below();
        }
        let parent_enabled = node.parent().map_or(true, |p| p.effective_enabled());
        node.refresh_enabled(parent_enabled);
    }

    /// Whether operations on this monitor are currently recorded.
    pub fn is_enabled(&self) -> bool {
        self.node.as_deref().is_some_and(Node::is_enabled)
    }

    pub fn note(&self) -> Option<String> {
        let node = self.node.as_deref()?;
        let guard = node.lock();
        let note = guard.borrow().note.clone();
        note
    }

    pub fn set_note(&self, note: Option<String>) {
        if let Some(node) = self.node.as_deref() {
            node.lock().borrow_mut().note = note;
        }
    }

    /// Wall-clock millis of the first use, `0` if never used.
    pub fn first_usage(&self) -> u64 {
        self.read_core(|core| core.first_usage)
    }

    /// Wall-clock millis of the last use, `0` if never used.
    pub fn last_usage(&self) -> u64 {
        self.read_core(|core| core.last_usage)
    }

    /// Wall-clock millis of the last reset, `0` if never reset.
    pub fn reset_timestamp(&self) -> u64 {
        self.read_core(|core| core.reset_timestamp)
    }

    fn read_core<T: Default>(&self, f: impl FnOnce(&crate::node::Core) -> T) -> T {
        match self.node.as_deref() {
            Some(node) => {
                let guard = node.lock();
                let value = f(&guard.borrow());
                value
            }
            None => T::default(),
        }
    }

    /// Typed attribute lookup. `None` if absent or of another type.
    pub fn attribute<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let node = self.node.as_deref()?;
        let guard = node.lock();
        let value = guard.borrow().attributes.get(name).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Stores an attribute, replacing any previous value under `name`.
    pub fn set_attribute<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        self.set_attribute_arc(name, Arc::new(value));
    }

    /// Stores an already shared attribute value.
    pub fn set_attribute_arc<T: Any + Send + Sync>(&self, name: impl Into<String>, value: Arc<T>) {
        if let Some(node) = self.node.as_deref() {
            node.lock().borrow_mut().attributes.insert(name.into(), value);
        }
    }

    /// Returns the attribute under `name`, inserting `init()` if it is absent.
    ///
    /// Atomic with respect to other threads. Returns `None` for the null
    /// monitor, or when the existing value has another type.
    pub fn attribute_or_insert_with<T: Any + Send + Sync>(
        &self,
        name: &str,
        init: impl FnOnce() -> T,
    ) -> Option<Arc<T>> {
        let node = self.node.as_deref()?;
        let guard = node.lock();
        let existing = guard.borrow().attributes.get(name).cloned();
        if let Some(value) = existing {
            return value.downcast::<T>().ok();
        }
        let value = Arc::new(init());
        guard
            .borrow_mut()
            .attributes
            .insert(name.to_string(), value.clone());
        Some(value)
    }

    /// Removes an attribute. Returns `true` if it was present.
    pub fn remove_attribute(&self, name: &str) -> bool {
        self.node
            .as_deref()
            .is_some_and(|node| node.lock().borrow_mut().attributes.remove(name).is_some())
    }

    /// Attribute names in sorted order.
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.node.as_deref() {
            Some(node) => node.lock().borrow().attributes.keys().cloned().collect(),
            None => Vec::new(),
        };
        names.sort();
        names
    }

    /// Runs `f` while holding this monitor's lock.
    ///
    /// The lock is re-entrant, so `f` may use this monitor. Other threads
    /// mutating or sampling it wait until `f` returns.
    pub fn synchronized<R>(&self, f: impl FnOnce() -> R) -> R {
        match self.node.as_deref() {
            Some(node) => {
                let _guard = node.lock();
                f()
            }
            None => f(),
        }
    }

    /// Clears the measurements, keeping state, note and attributes.
    ///
    /// Works whether or not the monitor is enabled. Generic monitors only
    /// record the reset timestamp.
    pub fn reset(&self) {
        let Some(node) = self.node.as_deref() else {
            return;
        };
        let now = node.context.clock.millis();
        let guard = node.lock();
        {
            let mut core = guard.borrow_mut();
            match &mut core.kind {
                Kind::Counter(data) => data.reset(),
                Kind::Stopwatch(data) => data.reset(now),
                Kind::Unknown => {}
            }
            core.reset_timestamp = now;
        }
        node.context.callback.on_simon_reset(self);
    }

    /// Current sample, `None` for generic and null monitors.
    pub fn sample(&self) -> Option<Sample> {
        let node = self.node.as_deref()?;
        let guard = node.lock();
        let core = guard.borrow();
        match &core.kind {
            Kind::Counter(_) => core.counter_sample(node.name()).map(Sample::Counter),
            Kind::Stopwatch(_) => core.stopwatch_sample(node.name()).map(Sample::Stopwatch),
            Kind::Unknown => None,
        }
    }

    /// This monitor as a counter, if it is one.
    pub fn as_counter(&self) -> Option<Counter> {
        (self.kind() == SimonKind::Counter).then(|| Counter::from_simon(self.clone()))
    }

    /// This monitor as a stopwatch, if it is one.
    pub fn as_stopwatch(&self) -> Option<Stopwatch> {
        (self.kind() == SimonKind::Stopwatch).then(|| Stopwatch::from_simon(self.clone()))
    }

    /// True if both handles point at the same monitor (or both are null).
    pub fn same_as(&self, other: &Simon) -> bool {
        match (&self.node, &other.node) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Simon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simon")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Display for Simon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} {}]", self.name(), self.kind(), self.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_simon_ignores_everything() {
        let null = Simon::null();
        null.set_note(Some("x".into()));
        null.set_attribute("a", 1u32);
        null.set_state(SimonState::Enabled, true);
        null.reset();

        assert!(null.is_null());
        assert_eq!(null.name(), "");
        assert_eq!(null.kind(), SimonKind::Null);
        assert!(!null.is_enabled());
        assert!(null.note().is_none());
        assert!(null.attribute::<u32>("a").is_none());
        assert!(null.sample().is_none());
        assert!(null.parent().is_none());
        assert!(null.children().is_empty());
        assert!(null.manager().is_none());
    }

    #[test]
    fn test_attributes() {
        let manager = Manager::new();
        let simon = manager.get_simon("attrs").unwrap();

        simon.set_attribute("answer", 42u32);
        simon.set_attribute("label", String::from("x"));
        assert_eq!(simon.attribute::<u32>("answer").as_deref(), Some(&42));
        assert!(simon.attribute::<String>("answer").is_none());
        assert_eq!(simon.attribute_names(), vec!["answer", "label"]);

        let first = simon.attribute_or_insert_with("list", Vec::<u64>::new).unwrap();
        let second = simon
            .attribute_or_insert_with("list", || vec![1u64])
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(simon.attribute_or_insert_with("answer", || 0u8).is_none());

        assert!(simon.remove_attribute("answer"));
        assert!(!simon.remove_attribute("answer"));
    }

    #[test]
    fn test_note_and_display() {
        let manager = Manager::new();
        let simon = manager.get_simon("a.b").unwrap();
        simon.set_note(Some("hello".into()));
        assert_eq!(simon.note().as_deref(), Some("hello"));
        assert_eq!(simon.local_name(), "b");
        assert_eq!(simon.to_string(), "a.b [unknown inherit]");
    }

    #[test]
    fn test_set_state_on_root_rejects_inherit() {
        let manager = Manager::new();
        let root = manager.root();
        root.set_state(SimonState::Inherit, false);
        assert_eq!(root.state(), SimonState::Enabled);
    }

    #[test]
    fn test_typed_views() {
        let manager = Manager::new();
        let counter = manager.get_counter("c").unwrap();
        let generic = manager.get_simon("c").unwrap();
        assert!(generic.as_counter().is_some());
        assert!(generic.as_stopwatch().is_none());
        assert!(generic.same_as(&counter));
        assert!(matches!(generic.sample(), Some(Sample::Counter(_))));
    }
}
