//! Internal state of one monitor in the registry tree.
//!
//! Lock order: the registry lock is never held while a node's core lock is
//! acquired. The children list is a leaf lock. The core lock is re-entrant,
//! but its `RefCell` must be released before callbacks are dispatched.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use simon_types::{CounterSample, SimonKind, SimonState, StopwatchSample};

use crate::callback::CompositeCallback;
use crate::clock::Clock;
use crate::counter::CounterData;
use crate::error::{Error, Result};
use crate::manager::ManagerInner;
use crate::name;
use crate::stopwatch::StopwatchData;

pub(crate) type Attribute = Arc<dyn Any + Send + Sync>;

/// Shared by every node of one registry.
pub(crate) struct Context {
    pub(crate) callback: CompositeCallback,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) enabled: AtomicBool,
    pub(crate) manager: Weak<ManagerInner>,
}

impl Context {
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Callbacks only need samples when someone is listening.
    pub(crate) fn has_callbacks(&self) -> bool {
        !self.callback.is_empty()
    }
}

/// A value with the wall-clock millis at which it was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Extremum<T> {
    pub(crate) value: T,
    pub(crate) timestamp: u64,
}

impl<T: Copy + PartialOrd> Extremum<T> {
    /// Replaces `slot` if `value` is strictly lower.
    pub(crate) fn lower(slot: &mut Option<Self>, value: T, now: u64) {
        if slot.map_or(true, |current| value < current.value) {
            *slot = Some(Self {
                value,
                timestamp: now,
            });
        }
    }

    /// Replaces `slot` if `value` is strictly higher.
    pub(crate) fn raise(slot: &mut Option<Self>, value: T, now: u64) {
        if slot.map_or(true, |current| value > current.value) {
            *slot = Some(Self {
                value,
                timestamp: now,
            });
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Kind {
    Unknown,
    Counter(CounterData),
    Stopwatch(StopwatchData),
}

impl Kind {
    fn fresh(kind: SimonKind) -> Self {
        match kind {
            SimonKind::Counter => Kind::Counter(CounterData::default()),
            SimonKind::Stopwatch => Kind::Stopwatch(StopwatchData::default()),
            SimonKind::Unknown | SimonKind::Null => Kind::Unknown,
        }
    }

    pub(crate) fn simon_kind(&self) -> SimonKind {
        match self {
            Kind::Unknown => SimonKind::Unknown,
            Kind::Counter(_) => SimonKind::Counter,
            Kind::Stopwatch(_) => SimonKind::Stopwatch,
        }
    }
}

/// Mutable part of a node, guarded by the node's core lock.
pub(crate) struct Core {
    pub(crate) kind: Kind,
    pub(crate) note: Option<String>,
    pub(crate) first_usage: u64,
    pub(crate) last_usage: u64,
    pub(crate) reset_timestamp: u64,
    pub(crate) attributes: HashMap<String, Attribute>,
}

impl Core {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            note: None,
            first_usage: 0,
            last_usage: 0,
            reset_timestamp: 0,
            attributes: HashMap::new(),
        }
    }

    /// Records a use at `now` (wall-clock millis).
    pub(crate) fn touch(&mut self, now: u64) {
        if self.first_usage == 0 {
            self.first_usage = now;
        }
        self.last_usage = now;
    }

    pub(crate) fn counter_sample(&self, name: &str) -> Option<CounterSample> {
        match &self.kind {
            Kind::Counter(data) => Some(data.sample(name, self)),
            _ => None,
        }
    }

    pub(crate) fn stopwatch_sample(&self, name: &str) -> Option<StopwatchSample> {
        match &self.kind {
            Kind::Stopwatch(data) => Some(data.sample(name, self)),
            _ => None,
        }
    }
}

pub(crate) struct Node {
    name: String,
    parent: Option<Weak<Node>>,
    pub(crate) context: Arc<Context>,
    /// Explicit state as set by the user or configuration.
    state: AtomicU8,
    /// Cached effective state, refreshed whenever an ancestor's state changes.
    enabled: AtomicBool,
    children: Mutex<Vec<Arc<Node>>>,
    core: ReentrantMutex<RefCell<Core>>,
}

impl Node {
    pub(crate) fn root(context: Arc<Context>) -> Arc<Self> {
        Arc::new(Self {
            name: name::ROOT_NAME.to_string(),
            parent: None,
            context,
            state: AtomicU8::new(SimonState::Enabled.as_u8()),
            enabled: AtomicBool::new(true),
            children: Mutex::new(Vec::new()),
            core: ReentrantMutex::new(RefCell::new(Core::new(Kind::Unknown))),
        })
    }

    /// Creates a node below `parent` and attaches it to the parent's children.
    ///
    /// The effective state is computed under the parent's children lock so
    /// that a concurrent state change on the parent cannot be missed.
    pub(crate) fn attach(
        parent: &Arc<Node>,
        name: String,
        kind: SimonKind,
        state: SimonState,
    ) -> Arc<Self> {
        let mut siblings = parent.children.lock();
        let enabled = match state {
            SimonState::Enabled => true,
            SimonState::Disabled => false,
            SimonState::Inherit => parent.enabled.load(Ordering::Acquire),
        };
        let node = Arc::new(Self {
            name,
            parent: Some(Arc::downgrade(parent)),
            context: parent.context.clone(),
            state: AtomicU8::new(state.as_u8()),
            enabled: AtomicBool::new(enabled),
            children: Mutex::new(Vec::new()),
            core: ReentrantMutex::new(RefCell::new(Core::new(Kind::fresh(kind)))),
        });
        siblings.push(node.clone());
        node
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn parent(&self) -> Option<Arc<Node>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn children(&self) -> Vec<Arc<Node>> {
        self.children.lock().clone()
    }

    pub(crate) fn has_children(&self) -> bool {
        !self.children.lock().is_empty()
    }

    pub(crate) fn detach_child(&self, child: &Arc<Node>) {
        self.children.lock().retain(|c| !Arc::ptr_eq(c, child));
    }

    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<Core>> {
        self.core.lock()
    }

    pub(crate) fn kind(&self) -> SimonKind {
        self.lock().borrow().kind.simon_kind()
    }

    pub(crate) fn explicit_state(&self) -> SimonState {
        SimonState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_explicit_state(&self, state: SimonState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Effective state without the registry-wide switch.
    pub(crate) fn effective_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Whether measurements on this node are recorded right now.
    pub(crate) fn is_enabled(&self) -> bool {
        self.context.is_enabled() && self.effective_enabled()
    }

    /// Recomputes the effective state of this subtree from `parent_enabled`.
    ///
    /// Callers serialize state changes; see `Manager`'s state lock.
    pub(crate) fn refresh_enabled(&self, parent_enabled: bool) {
        let enabled = match self.explicit_state() {
            SimonState::Enabled => true,
            SimonState::Disabled => false,
            SimonState::Inherit => parent_enabled,
        };
        self.enabled.store(enabled, Ordering::Release);
        for child in self.children() {
            child.refresh_enabled(enabled);
        }
    }

    /// Sets every descendant's explicit state to `Inherit`.
    pub(crate) fn inherit_below(&self) {
        for child in self.children() {
            child.set_explicit_state(SimonState::Inherit);
            child.inherit_below();
        }
    }

    /// Turns an `Unknown` node into the requested kind in place.
    ///
    /// Returns `true` if the node was promoted. Requesting `Unknown` matches
    /// any kind.
    pub(crate) fn promote(&self, requested: SimonKind) -> Result<bool> {
        let guard = self.lock();
        let mut core = guard.borrow_mut();
        let existing = core.kind.simon_kind();
        match (existing, requested) {
            (_, SimonKind::Unknown) => Ok(false),
            (SimonKind::Unknown, _) => {
                core.kind = Kind::fresh(requested);
                Ok(true)
            }
            (existing, requested) if existing == requested => Ok(false),
            (existing, requested) => Err(Error::TypeConflict {
                name: self.name.clone(),
                existing,
                requested,
            }),
        }
    }

    /// Turns the node back into a generic node, dropping its measurements.
    pub(crate) fn demote(&self) {
        let guard = self.lock();
        let mut core = guard.borrow_mut();
        core.kind = Kind::Unknown;
        core.attributes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn context() -> Arc<Context> {
        Arc::new(Context {
            callback: CompositeCallback::new(),
            clock: Arc::new(MockClock::default()),
            enabled: AtomicBool::new(true),
            manager: Weak::new(),
        })
    }

    #[test]
    fn test_extremum_updates_strictly() {
        let mut slot = None;
        Extremum::lower(&mut slot, 5, 1);
        Extremum::lower(&mut slot, 5, 2);
        assert_eq!(slot, Some(Extremum { value: 5, timestamp: 1 }));
        Extremum::lower(&mut slot, 3, 3);
        assert_eq!(slot.map(|e| e.value), Some(3));

        let mut slot = None;
        Extremum::raise(&mut slot, 5u64, 1);
        Extremum::raise(&mut slot, 4, 2);
        assert_eq!(slot, Some(Extremum { value: 5, timestamp: 1 }));
    }

    #[test]
    fn test_children_inherit_effective_state() {
        let root = Node::root(context());
        let a = Node::attach(&root, "a".into(), SimonKind::Unknown, SimonState::Inherit);
        let b = Node::attach(&a, "a.b".into(), SimonKind::Counter, SimonState::Inherit);
        assert!(b.is_enabled());

        a.set_explicit_state(SimonState::Disabled);
        a.refresh_enabled(root.effective_enabled());
        assert!(!a.is_enabled());
        assert!(!b.is_enabled());

        b.set_explicit_state(SimonState::Enabled);
        a.refresh_enabled(root.effective_enabled());
        assert!(b.is_enabled());

        a.inherit_below();
        a.refresh_enabled(root.effective_enabled());
        assert_eq!(b.explicit_state(), SimonState::Inherit);
        assert!(!b.is_enabled());
    }

    #[test]
    fn test_promotion_and_conflict() {
        let root = Node::root(context());
        let a = Node::attach(&root, "a".into(), SimonKind::Unknown, SimonState::Inherit);

        assert!(a.promote(SimonKind::Counter).unwrap());
        assert!(!a.promote(SimonKind::Counter).unwrap());
        assert!(!a.promote(SimonKind::Unknown).unwrap());
        assert!(matches!(
            a.promote(SimonKind::Stopwatch),
            Err(Error::TypeConflict { .. })
        ));

        a.demote();
        assert_eq!(a.kind(), SimonKind::Unknown);
    }

    #[test]
    fn test_context_switch_overrides_tree() {
        let ctx = context();
        let root = Node::root(ctx.clone());
        let a = Node::attach(&root, "a".into(), SimonKind::Counter, SimonState::Enabled);
        ctx.enabled.store(false, Ordering::Release);
        assert!(!a.is_enabled());
        assert!(a.effective_enabled());
    }
}
