#![forbid(unsafe_code)]

//! Rendering environment handle.
//!
//! Every reference holds an [`Environment`]. It carries the [`Tracker`]
//! values are computed against, the configuration, and in debug builds a
//! registry of template paths (`this.user.name`) used to name references in
//! diagnostics and errors.

use std::cell::Cell;
#[cfg(any(debug_assertions, feature = "debug-checks"))]
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[cfg(any(debug_assertions, feature = "debug-checks"))]
use ahash::AHashMap;
use trellis_validator::{DiagnosticsSink, Tracker, TrackerConfig};

/// Identifier of a reference within its environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferenceId(u64);

impl ReferenceId {
    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Configuration for an [`Environment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Configuration of the environment's tracker.
    pub tracker: TrackerConfig,
    /// Return the same child reference for repeated `get(key)` calls.
    pub memoize_children: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            memoize_children: true,
        }
    }
}

impl EnvironmentConfig {
    /// Set the maximum nesting of helper evaluations.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.tracker = self.tracker.with_max_depth(max_depth);
        self
    }

    /// Enable or disable child memoization.
    #[must_use]
    pub fn with_memoize_children(mut self, memoize: bool) -> Self {
        self.memoize_children = memoize;
        self
    }
}

#[cfg(any(debug_assertions, feature = "debug-checks"))]
struct DebugPath {
    key: Rc<str>,
    parent: Option<ReferenceId>,
}

struct EnvironmentInner {
    tracker: Tracker,
    config: EnvironmentConfig,
    next_id: Cell<u64>,
    #[cfg(any(debug_assertions, feature = "debug-checks"))]
    paths: RefCell<AHashMap<ReferenceId, DebugPath>>,
}

/// Cheaply cloneable environment handle. Clones share all state.
#[derive(Clone)]
pub struct Environment {
    inner: Rc<EnvironmentInner>,
}

impl Environment {
    /// Create an environment whose diagnostics go to `tracing`.
    #[must_use]
    pub fn new(config: EnvironmentConfig) -> Self {
        let tracker = Tracker::new(config.tracker.clone());
        Self::with_tracker(tracker, config)
    }

    /// Create an environment reporting diagnostics to `sink`.
    #[must_use]
    pub fn with_sink(config: EnvironmentConfig, sink: Rc<dyn DiagnosticsSink>) -> Self {
        let tracker = Tracker::with_sink(config.tracker.clone(), sink);
        Self::with_tracker(tracker, config)
    }

    fn with_tracker(tracker: Tracker, config: EnvironmentConfig) -> Self {
        Self {
            inner: Rc::new(EnvironmentInner {
                tracker,
                config,
                next_id: Cell::new(1),
                #[cfg(any(debug_assertions, feature = "debug-checks"))]
                paths: RefCell::new(AHashMap::new()),
            }),
        }
    }

    /// The tracker values in this environment are computed against.
    #[must_use]
    pub fn tracker(&self) -> &Tracker {
        &self.inner.tracker
    }

    #[must_use]
    pub fn config(&self) -> &EnvironmentConfig {
        &self.inner.config
    }

    /// Whether both handles refer to the same environment.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn next_reference_id(&self) -> ReferenceId {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        ReferenceId(id)
    }

    /// Record that `reference` was reached from `parent` through `key`.
    #[cfg(any(debug_assertions, feature = "debug-checks"))]
    pub fn set_template_path_debug_context(
        &self,
        reference: ReferenceId,
        key: &str,
        parent: Option<ReferenceId>,
    ) {
        self.inner.paths.borrow_mut().insert(
            reference,
            DebugPath {
                key: key.into(),
                parent,
            },
        );
    }

    /// Record that `reference` was reached from `parent` through `key`.
    ///
    /// Release builds keep no debug paths; the call does nothing.
    #[cfg(not(any(debug_assertions, feature = "debug-checks")))]
    #[inline(always)]
    pub fn set_template_path_debug_context(
        &self,
        _reference: ReferenceId,
        _key: &str,
        _parent: Option<ReferenceId>,
    ) {
    }

    /// Forget the path of a dropped reference.
    #[cfg(any(debug_assertions, feature = "debug-checks"))]
    pub(crate) fn clear_template_path_debug_context(&self, reference: ReferenceId) {
        self.inner.paths.borrow_mut().remove(&reference);
    }

    #[cfg(not(any(debug_assertions, feature = "debug-checks")))]
    #[inline(always)]
    pub(crate) fn clear_template_path_debug_context(&self, _reference: ReferenceId) {}

    /// Number of registered template paths.
    #[cfg(all(test, any(debug_assertions, feature = "debug-checks")))]
    pub(crate) fn template_path_count(&self) -> usize {
        self.inner.paths.borrow().len()
    }

    /// Dotted template path of `reference`, e.g. `this.user.name`.
    ///
    /// `None` for unregistered references.
    #[cfg(any(debug_assertions, feature = "debug-checks"))]
    #[must_use]
    pub fn template_path(&self, reference: ReferenceId) -> Option<String> {
        let paths = self.inner.paths.borrow();
        let mut segments = Vec::new();
        let mut cursor = Some(reference);
        while let Some(id) = cursor {
            let entry = paths.get(&id)?;
            segments.push(Rc::clone(&entry.key));
            cursor = entry.parent;
        }
        segments.reverse();
        Some(segments.join("."))
    }

    /// Dotted template path of `reference`. Always `None` in release builds.
    #[cfg(not(any(debug_assertions, feature = "debug-checks")))]
    #[must_use]
    pub fn template_path(&self, _reference: ReferenceId) -> Option<String> {
        None
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(EnvironmentConfig::default())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("tracker", &self.inner.tracker)
            .field("config", &self.inner.config)
            .finish()
    }
}
