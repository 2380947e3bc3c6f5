#![forbid(unsafe_code)]

//! Tracked transactions.
//!
//! A [`Tracker`] is the explicit context threaded through every value
//! computation. It owns:
//!
//! - the revision clock advanced by [`DirtyableTag::dirty`](crate::DirtyableTag::dirty),
//! - a stack of open frames, each recording the tags consumed while it is on
//!   top,
//! - the [`DiagnosticsSink`] debug checks report into.
//!
//! # Design
//!
//! `Tracker` is cheaply cloneable (`Rc` inside) and single-threaded. There is
//! no ambient "current tracker": code that reads tracked state is handed the
//! tracker it should report to. Frames are RAII guards, so a computation that
//! returns early with an error or unwinds still leaves the stack balanced.
//!
//! # Invariants
//!
//! 1. The clock only moves forward.
//! 2. A closed frame's combined tag is consumed by the frame below it.
//! 3. The stack never grows beyond [`TrackerConfig::max_depth`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashSet;

use crate::diagnostics::{Diagnostic, DiagnosticsSink, TracingSink};
#[cfg(any(debug_assertions, feature = "debug-checks"))]
use crate::diagnostics::Severity;
use crate::error::{Result, TrackingError};
use crate::revision::Revision;
use crate::tag::{Tag, combine};

/// Configuration for a [`Tracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Maximum number of simultaneously open frames.
    pub max_depth: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { max_depth: 256 }
    }
}

impl TrackerConfig {
    /// Set the maximum frame depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

struct Frame {
    label: Rc<str>,
    tags: Vec<Tag>,
    seen: AHashSet<usize>,
    /// Identities read in this frame or in any nested frame closed under it.
    #[cfg(any(debug_assertions, feature = "debug-checks"))]
    read: AHashSet<usize>,
}

impl Frame {
    fn new(label: Rc<str>) -> Self {
        Self {
            label,
            tags: Vec::new(),
            seen: AHashSet::new(),
            #[cfg(any(debug_assertions, feature = "debug-checks"))]
            read: AHashSet::new(),
        }
    }

    fn add(&mut self, tag: &Tag) {
        #[cfg(any(debug_assertions, feature = "debug-checks"))]
        self.read.insert(tag.identity());
        if self.seen.insert(tag.identity()) {
            self.tags.push(tag.clone());
        }
    }
}

pub(crate) struct TrackerState {
    revision: Cell<Revision>,
    frames: RefCell<Vec<Frame>>,
    config: TrackerConfig,
    sink: Rc<dyn DiagnosticsSink>,
    /// Nesting count of `deprecate_mutations` calls.
    #[cfg(any(debug_assertions, feature = "debug-checks"))]
    deprecations: Cell<u32>,
}

impl TrackerState {
    pub(crate) fn advance(&self) -> Revision {
        let next = self.revision.get().next();
        self.revision.set(next);
        next
    }

    fn consume(&self, tag: &Tag) {
        if tag.is_constant() {
            return;
        }
        if let Some(frame) = self.frames.borrow_mut().last_mut() {
            frame.add(tag);
        }
    }

    fn close_frame(&self, depth: usize) -> Tag {
        let frame = {
            let mut frames = self.frames.borrow_mut();
            debug_assert_eq!(frames.len(), depth, "track frames closed out of order");
            frames.pop()
        };
        let Some(frame) = frame else {
            return Tag::CONSTANT;
        };
        #[cfg(any(debug_assertions, feature = "debug-checks"))]
        if let Some(parent) = self.frames.borrow_mut().last_mut() {
            parent.read.extend(frame.read.iter().copied());
        }
        let count = frame.tags.len();
        let combined = combine(frame.tags);
        tracing::trace!(
            message = "tracker.frame",
            label = &*frame.label,
            depth,
            tags = count,
            revision = combined.revision().raw()
        );
        self.consume(&combined);
        combined
    }

    #[cfg(any(debug_assertions, feature = "debug-checks"))]
    pub(crate) fn check_not_consumed(&self, tag: &Tag, label: Option<&str>) {
        let key = tag.identity();
        let frame = self
            .frames
            .borrow()
            .iter()
            .rev()
            .find(|frame| frame.read.contains(&key))
            .map(|frame| Rc::clone(&frame.label));
        let Some(frame) = frame else {
            return;
        };
        let severity = if self.deprecations.get() > 0 {
            Severity::Deprecation
        } else {
            Severity::Assertion
        };
        self.sink
            .report(&Diagnostic::mutation_after_consumption(severity, label, &frame));
    }
}

/// Explicit tracking context.
///
/// Cheaply cloneable; clones share the clock and the frame stack.
#[derive(Clone)]
pub struct Tracker {
    state: Rc<TrackerState>,
}

impl Tracker {
    /// Create a tracker that logs diagnostics through `tracing`.
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_sink(config, Rc::new(TracingSink))
    }

    /// Create a tracker reporting diagnostics to `sink`.
    #[must_use]
    pub fn with_sink(config: TrackerConfig, sink: Rc<dyn DiagnosticsSink>) -> Self {
        Self {
            state: Rc::new(TrackerState {
                revision: Cell::new(Revision::INITIAL),
                frames: RefCell::new(Vec::new()),
                config,
                sink,
                #[cfg(any(debug_assertions, feature = "debug-checks"))]
                deprecations: Cell::new(0),
            }),
        }
    }

    pub(crate) fn state(&self) -> &Rc<TrackerState> {
        &self.state
    }

    /// The configuration this tracker was created with.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.state.config
    }

    /// Latest revision produced by the clock.
    #[must_use]
    pub fn current_revision(&self) -> Revision {
        self.state.revision.get()
    }

    /// Number of open frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.state.frames.borrow().len()
    }

    /// Whether any frame is open.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        !self.state.frames.borrow().is_empty()
    }

    /// Open a new frame on top of the stack.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::DepthExceeded`] when the stack is already at
    /// [`TrackerConfig::max_depth`].
    pub fn begin_frame(&self, label: impl Into<Rc<str>>) -> Result<TrackFrame<'_>> {
        let label = label.into();
        let mut frames = self.state.frames.borrow_mut();
        let limit = self.state.config.max_depth;
        if frames.len() >= limit {
            tracing::warn!(message = "tracker.depth_exceeded", limit, label = &*label);
            return Err(TrackingError::DepthExceeded {
                limit,
                label: label.to_string(),
            });
        }
        frames.push(Frame::new(label));
        Ok(TrackFrame {
            tracker: self,
            depth: frames.len(),
            open: true,
        })
    }

    /// Run `f` inside a fresh frame and return its result with the combined
    /// tag of everything it consumed.
    ///
    /// # Errors
    ///
    /// Fails only when the frame cannot be opened; see [`begin_frame`](Self::begin_frame).
    pub fn track<R>(&self, label: impl Into<Rc<str>>, f: impl FnOnce() -> R) -> Result<(R, Tag)> {
        let frame = self.begin_frame(label)?;
        let result = f();
        Ok((result, frame.finish()))
    }

    /// Record `tag` in the innermost open frame.
    ///
    /// Constant tags and reads outside any frame are ignored. A tag consumed
    /// twice by the same frame is recorded once.
    pub fn consume(&self, tag: &Tag) {
        self.state.consume(tag);
    }

    /// Run `f` with tracking suspended: nothing it consumes reaches the
    /// currently open frames.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let saved = std::mem::take(&mut *self.state.frames.borrow_mut());
        let _restore = UntrackGuard {
            tracker: self,
            saved: Some(saved),
        };
        f()
    }

    /// Run `f` with mutation-after-consumption downgraded to a deprecation.
    #[cfg(any(debug_assertions, feature = "debug-checks"))]
    pub fn deprecate_mutations<R>(&self, f: impl FnOnce() -> R) -> R {
        let deprecations = &self.state.deprecations;
        deprecations.set(deprecations.get() + 1);
        let _restore = DeprecationGuard { tracker: self };
        f()
    }

    /// Run `f` with mutation-after-consumption downgraded to a deprecation.
    #[cfg(not(any(debug_assertions, feature = "debug-checks")))]
    #[inline(always)]
    pub fn deprecate_mutations<R>(&self, f: impl FnOnce() -> R) -> R {
        f()
    }

    /// Hand a diagnostic to the configured sink.
    pub fn report(&self, diagnostic: &Diagnostic) {
        self.state.sink.report(diagnostic);
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("revision", &self.current_revision())
            .field("depth", &self.depth())
            .field("config", &self.state.config)
            .finish()
    }
}

/// RAII guard for an open frame.
///
/// [`finish`](Self::finish) closes the frame and returns its combined tag.
/// Dropping the guard without finishing also closes the frame; tags read so
/// far still bubble into the enclosing frame.
#[must_use = "dropping a TrackFrame closes it immediately"]
pub struct TrackFrame<'a> {
    tracker: &'a Tracker,
    depth: usize,
    open: bool,
}

impl TrackFrame<'_> {
    /// Stack depth of this frame (1 for the outermost).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Close the frame, bubble its combined tag into the enclosing frame and
    /// return it.
    pub fn finish(mut self) -> Tag {
        self.open = false;
        self.tracker.state.close_frame(self.depth)
    }
}

impl Drop for TrackFrame<'_> {
    fn drop(&mut self) {
        if self.open {
            self.tracker.state.close_frame(self.depth);
        }
    }
}

impl fmt::Debug for TrackFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackFrame")
            .field("depth", &self.depth)
            .field("open", &self.open)
            .finish()
    }
}

struct UntrackGuard<'a> {
    tracker: &'a Tracker,
    saved: Option<Vec<Frame>>,
}

impl Drop for UntrackGuard<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.tracker.state.frames.borrow_mut() = saved;
        }
    }
}

#[cfg(any(debug_assertions, feature = "debug-checks"))]
struct DeprecationGuard<'a> {
    tracker: &'a Tracker,
}

#[cfg(any(debug_assertions, feature = "debug-checks"))]
impl Drop for DeprecationGuard<'_> {
    fn drop(&mut self) {
        let deprecations = &self.tracker.state.deprecations;
        deprecations.set(deprecations.get().saturating_sub(1));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
