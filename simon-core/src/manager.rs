//! The monitor registry.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use simon_types::{ManagerSnapshot, Sample, SimonKind, SimonState};
use tracing::debug;

use crate::callback::{Callback, CompositeCallback};
use crate::clock::{Clock, SystemClock};
use crate::config::ManagerConfig;
use crate::counter::Counter;
use crate::error::{Error, Result};
use crate::name::{self, SimonPattern, ROOT_NAME, SEPARATOR};
use crate::node::{Context, Node};
use crate::simon::Simon;
use crate::stopwatch::Stopwatch;

struct Tree {
    root: Arc<Node>,
    /// Every non-root node by full name.
    nodes: HashMap<String, Arc<Node>>,
}

impl Tree {
    fn new(root: Arc<Node>) -> Self {
        Self {
            root,
            nodes: HashMap::new(),
        }
    }

    fn get(&self, name: &str) -> Option<&Arc<Node>> {
        if name == ROOT_NAME {
            Some(&self.root)
        } else {
            self.nodes.get(name)
        }
    }
}

pub(crate) struct ManagerInner {
    pub(crate) context: Arc<Context>,
    tree: RwLock<Tree>,
    /// Serializes explicit state changes and their propagation.
    pub(crate) state_lock: Mutex<()>,
    rules: Vec<(SimonPattern, SimonState)>,
}

impl ManagerInner {
    fn initial_state(&self, name: &str) -> SimonState {
        self.rules
            .iter()
            .rev()
            .find(|(pattern, _)| pattern.matches(name))
            .map_or(SimonState::Inherit, |(_, state)| *state)
    }
}

/// A registry of monitors organized by dotted name.
///
/// Monitors are created on first access together with any missing
/// ancestors, which start out as generic monitors and are promoted in place
/// when accessed with a type. The manager is cheap to clone; clones share
/// the same registry.
///
/// # Example
///
/// ```rust
/// use simon_core::Manager;
///
/// let manager = Manager::new();
/// let hits = manager.get_counter("web.cache.hits").unwrap();
/// hits.increment();
///
/// assert_eq!(manager.simon_names(), vec!["", "web", "web.cache", "web.cache.hits"]);
/// let snapshot = manager.collect();
/// assert_eq!(snapshot.counter("web.cache.hits").unwrap().counter, 1);
/// ```
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

impl Manager {
    /// An enabled registry with the system clock and no callbacks.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    /// A registry set up from `config`.
    pub fn from_config(config: ManagerConfig) -> Result<Self> {
        Ok(Self::builder().config(config)?.build())
    }

    pub(crate) fn from_inner(inner: Arc<ManagerInner>) -> Self {
        Self { inner }
    }

    fn context(&self) -> &Context {
        &self.inner.context
    }

    /// The counter named `name`, created if needed.
    ///
    /// Returns a null counter while the registry is disabled.
    pub fn get_counter(&self, name: &str) -> Result<Counter> {
        self.get_or_create(name, SimonKind::Counter)
            .map(Counter::from_simon)
    }

    /// The stopwatch named `name`, created if needed.
    ///
    /// Returns a null stopwatch while the registry is disabled.
    pub fn get_stopwatch(&self, name: &str) -> Result<Stopwatch> {
        self.get_or_create(name, SimonKind::Stopwatch)
            .map(Stopwatch::from_simon)
    }

    /// The monitor named `name` of whatever kind, created as a generic
    /// monitor if needed. `""` is the root.
    pub fn get_simon(&self, name: &str) -> Result<Simon> {
        self.get_or_create(name, SimonKind::Unknown)
    }

    fn get_or_create(&self, name: &str, requested: SimonKind) -> Result<Simon> {
        if !self.is_enabled() {
            return Ok(Simon::null());
        }
        if name == ROOT_NAME {
            return match requested {
                SimonKind::Unknown => Ok(self.root()),
                _ => Err(Error::BadName(name.to_string())),
            };
        }
        name::validate(name)?;

        // Fast path: existing monitor
        let existing = self.inner.tree.read().nodes.get(name).cloned();
        let (node, created) = match existing {
            Some(node) => (node, Vec::new()),
            None => self.create_path(name, requested),
        };

        let promoted = node.promote(requested)?;
        if promoted {
            debug!(name, kind = %requested, "monitor promoted");
        }

        let callback = &self.context().callback;
        for new_node in created {
            callback.on_simon_created(&Simon::from_node(new_node));
        }
        let simon = Simon::from_node(node);
        if promoted {
            callback.on_simon_created(&simon);
        }
        Ok(simon)
    }

    /// Slow path: creates `name` and its missing ancestors, top-down.
    ///
    /// Returns the node for `name` and the nodes created, in creation order.
    /// The leaf is created with the requested kind right away.
    fn create_path(&self, name: &str, requested: SimonKind) -> (Arc<Node>, Vec<Arc<Node>>) {
        let mut tree = self.inner.tree.write();
        // Double-check after acquiring the write lock
        if let Some(node) = tree.nodes.get(name) {
            return (node.clone(), Vec::new());
        }

        let mut created = Vec::new();
        let mut parent = tree.root.clone();
        let boundaries = name
            .match_indices(SEPARATOR)
            .map(|(index, _)| index)
            .chain(std::iter::once(name.len()));
        for end in boundaries {
            let prefix = &name[..end];
            let node = match tree.nodes.get(prefix) {
                Some(node) => node.clone(),
                None => {
                    let kind = if end == name.len() {
                        requested
                    } else {
                        SimonKind::Unknown
                    };
                    let state = self.inner.initial_state(prefix);
                    let node = Node::attach(&parent, prefix.to_string(), kind, state);
                    tree.nodes.insert(prefix.to_string(), node.clone());
                    debug!(name = prefix, %kind, "monitor created");
                    created.push(node.clone());
                    node
                }
            };
            parent = node;
        }
        (parent, created)
    }

    /// Looks a monitor up without creating it.
    pub fn find_simon(&self, name: &str) -> Option<Simon> {
        let node = self.inner.tree.read().get(name).cloned()?;
        Some(Simon::from_node(node))
    }

    /// Removes the monitor named `name`.
    ///
    /// A monitor with children cannot leave the tree; it is turned back into
    /// a generic monitor instead, losing its measurements. The root cannot be
    /// destroyed. Returns `false` if there was nothing to destroy.
    pub fn destroy_simon(&self, name: &str) -> bool {
        if name == ROOT_NAME {
            return false;
        }
        let (node, removed) = {
            let mut tree = self.inner.tree.write();
            let Some(node) = tree.nodes.get(name).cloned() else {
                return false;
            };
            if node.has_children() {
                (node, false)
            } else {
                tree.nodes.remove(name);
                if let Some(parent) = node.parent() {
                    parent.detach_child(&node);
                }
                (node, true)
            }
        };
        if !removed {
            node.demote();
        }
        debug!(name, removed, "monitor destroyed");
        self.context()
            .callback
            .on_simon_destroyed(&Simon::from_node(node));
        true
    }

    /// The root monitor, or the null monitor while the registry is disabled.
    pub fn root(&self) -> Simon {
        if !self.is_enabled() {
            return Simon::null();
        }
        Simon::from_node(self.inner.tree.read().root.clone())
    }

    /// Sorted names of every monitor, the root's `""` included.
    pub fn simon_names(&self) -> Vec<String> {
        let tree = self.inner.tree.read();
        let mut names: Vec<String> = std::iter::once(ROOT_NAME.to_string())
            .chain(tree.nodes.keys().cloned())
            .collect();
        drop(tree);
        names.sort();
        names
    }

    /// Monitors whose names match `pattern`, sorted by name.
    pub fn simons(&self, pattern: &SimonPattern) -> Vec<Simon> {
        let mut nodes: Vec<Arc<Node>> = {
            let tree = self.inner.tree.read();
            std::iter::once(&tree.root)
                .chain(tree.nodes.values())
                .filter(|node| pattern.matches(node.name()))
                .cloned()
                .collect()
        };
        nodes.sort_by(|a, b| a.name().cmp(b.name()));
        nodes.into_iter().map(Simon::from_node).collect()
    }

    /// Samples every counter and stopwatch.
    ///
    /// Each sample is coherent on its own; monitors are sampled one by one.
    pub fn collect(&self) -> ManagerSnapshot {
        let nodes: Vec<Arc<Node>> = self.inner.tree.read().nodes.values().cloned().collect();
        let mut snapshot = ManagerSnapshot::builder().timestamp_ms(self.context().clock.millis());
        for node in nodes {
            match Simon::from_node(node).sample() {
                Some(Sample::Counter(sample)) => snapshot = snapshot.counter(sample),
                Some(Sample::Stopwatch(sample)) => snapshot = snapshot.stopwatch(sample),
                None => {}
            }
        }
        snapshot.build()
    }

    /// Drops the whole tree and starts over with a fresh, enabled root.
    ///
    /// Every removed monitor is reported through `on_simon_destroyed`.
    /// Existing handles keep working but are no longer part of the registry.
    pub fn reset(&self) {
        let old = {
            let mut tree = self.inner.tree.write();
            let root = Node::root(self.inner.context.clone());
            std::mem::replace(&mut *tree, Tree::new(root))
        };
        debug!(monitors = old.nodes.len(), "manager reset");

        let mut removed: Vec<Arc<Node>> = old.nodes.into_values().collect();
        removed.sort_by(|a, b| a.name().cmp(b.name()));
        for node in removed {
            self.context()
                .callback
                .on_simon_destroyed(&Simon::from_node(node));
        }
    }

    /// Switches the registry on. The tree is left as it was.
    pub fn enable(&self) {
        self.context().enabled.store(true, Ordering::Release);
    }

    /// Switches the registry off: lookups return null monitors, existing
    /// handles stop recording and no events are fired.
    pub fn disable(&self) {
        self.context().enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.context().is_enabled()
    }

    /// Attaches a callback and calls its `on_manager_start`.
    pub fn add_callback(&self, callback: Arc<dyn Callback>) {
        self.context().callback.add(callback.clone());
        let single = CompositeCallback::new();
        single.add(callback);
        single.on_manager_start(self);
    }

    /// Detaches a callback and calls its `on_manager_stop`.
    ///
    /// Returns `false` if the callback was not attached.
    pub fn remove_callback(&self, callback: &Arc<dyn Callback>) -> bool {
        let removed = self.context().callback.remove(callback);
        if removed {
            let single = CompositeCallback::new();
            single.add(callback.clone());
            single.on_manager_stop();
        }
        removed
    }

    /// Snapshot of the attached callbacks in registration order.
    pub fn callbacks(&self) -> Vec<Arc<dyn Callback>> {
        self.context().callback.callbacks()
    }

    /// Detaches every callback, calling `on_manager_stop` on each.
    pub fn shutdown(&self) {
        let detached = CompositeCallback::new();
        for callback in self.context().callback.clear() {
            detached.add(callback);
        }
        debug!(callbacks = detached.len(), "manager shut down");
        detached.on_manager_stop();
    }

    /// Forwards a message to every callback.
    pub fn message(&self, message: &str) {
        if self.is_enabled() {
            self.context().callback.on_message(message);
        }
    }

    /// Forwards a warning to every callback.
    pub fn warning(&self, warning: &str, cause: Option<&(dyn StdError + 'static)>) {
        if self.is_enabled() {
            self.context().callback.on_warning(warning, cause);
        }
    }

    /// The clock used for every timestamp in this registry.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.context().clock.clone()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("enabled", &self.is_enabled())
            .field("monitors", &(self.inner.tree.read().nodes.len() + 1))
            .field("callbacks", &self.context().callback)
            .finish()
    }
}

/// The process-wide default registry, created on first use.
///
/// Prefer passing a [`Manager`] around; this exists for code that cannot.
pub fn manager() -> &'static Manager {
    static DEFAULT: OnceLock<Manager> = OnceLock::new();
    DEFAULT.get_or_init(Manager::new)
}

/// Builder for configuring a [`Manager`].
#[derive(Default)]
pub struct ManagerBuilder {
    clock: Option<Arc<dyn Clock>>,
    callbacks: Vec<Arc<dyn Callback>>,
    disabled: bool,
    rules: Vec<(SimonPattern, SimonState)>,
}

impl ManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time source. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Adds a callback. Callbacks receive events in the order they were added.
    pub fn callback(mut self, callback: Arc<dyn Callback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    /// Starts the registry enabled (the default) or disabled.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.disabled = !enabled;
        self
    }

    /// Explicit state for new monitors matching `pattern`.
    ///
    /// Later rules take precedence over earlier ones.
    pub fn rule(mut self, pattern: SimonPattern, state: SimonState) -> Self {
        self.rules.push((pattern, state));
        self
    }

    /// Applies a loaded configuration.
    ///
    /// Fails if the quantiles section describes unusable buckets.
    pub fn config(mut self, config: ManagerConfig) -> Result<Self> {
        self.disabled = !config.enabled;
        self.rules.extend(config.rules());
        if let Some(quantiles) = &config.quantiles {
            self.callbacks.push(Arc::new(quantiles.callback()?));
        }
        Ok(self)
    }

    pub fn build(self) -> Manager {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()) as Arc<dyn Clock>);
        let enabled = !self.disabled;
        let rules = self.rules;

        let inner = Arc::new_cyclic(|weak| {
            let context = Arc::new(Context {
                callback: CompositeCallback::new(),
                clock,
                enabled: AtomicBool::new(enabled),
                manager: weak.clone(),
            });
            let root = Node::root(context.clone());
            ManagerInner {
                context,
                tree: RwLock::new(Tree::new(root)),
                state_lock: Mutex::new(()),
                rules,
            }
        });

        let manager = Manager { inner };
        for callback in self.callbacks {
            manager.add_callback(callback);
        }
        manager
    }
}
