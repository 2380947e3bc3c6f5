#![forbid(unsafe_code)]

//! Validity tags.
//!
//! # Design
//!
//! A [`Tag`] is a shared handle to a node in a small tag graph. Four kinds
//! exist:
//!
//! | Kind        | Revision                                   | Created by           |
//! |-------------|--------------------------------------------|----------------------|
//! | constant    | [`Revision::CONSTANT`], forever            | [`Tag::CONSTANT`]    |
//! | dirtyable   | stamped on each [`DirtyableTag::dirty`]    | [`DirtyableTag`]     |
//! | updatable   | max of its own floor and its current subtag| [`UpdatableTag`]     |
//! | combinator  | max of its children                        | [`combine`]          |
//!
//! Cloning a tag clones the handle, never the node: two clones are the
//! [`same`](Tag::same) tag and see every future change together.
//!
//! # Invariants
//!
//! 1. `revision()` never decreases for any tag.
//! 2. `combine` never yields a revision lower than any of its inputs.
//! 3. The constant tag is never stamped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::revision::Revision;
use crate::tracker::{Tracker, TrackerState};

pub(crate) enum TagNode {
    Dirtyable {
        revision: Cell<Revision>,
    },
    Updatable {
        /// Floor raised on every update so the revision never goes backwards.
        revision: Cell<Revision>,
        subtag: RefCell<Tag>,
    },
    Combinator(Box<[Tag]>),
}

/// An opaque validity token.
///
/// Consumers take a [`revision`](Self::revision) snapshot after reading a
/// value and later call [`validate`](Self::validate) to learn whether
/// anything the value depended on has changed since.
#[derive(Clone)]
pub struct Tag {
    node: Option<Rc<TagNode>>,
}

impl Tag {
    /// The always-valid tag. Values behind it never change.
    pub const CONSTANT: Self = Self { node: None };

    fn from_node(node: TagNode) -> Self {
        Self {
            node: Some(Rc::new(node)),
        }
    }

    /// Whether this is the constant tag.
    #[inline]
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.node.is_none()
    }

    /// Current revision of this tag.
    #[must_use]
    pub fn revision(&self) -> Revision {
        match self.node.as_deref() {
            None => Revision::CONSTANT,
            Some(TagNode::Dirtyable { revision }) => revision.get(),
            Some(TagNode::Updatable { revision, subtag }) => {
                revision.get().max(subtag.borrow().revision())
            }
            Some(TagNode::Combinator(tags)) => tags
                .iter()
                .map(Tag::revision)
                .max()
                .unwrap_or(Revision::CONSTANT),
        }
    }

    /// Whether nothing behind this tag changed after `snapshot` was taken.
    #[inline]
    #[must_use]
    pub fn validate(&self, snapshot: Revision) -> bool {
        self.revision() <= snapshot
    }

    /// Identity comparison: true when both handles point at the same node.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (&self.node, &other.node) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Stable identity key, `0` for the constant tag.
    pub(crate) fn identity(&self) -> usize {
        self.node.as_ref().map_or(0, |node| Rc::as_ptr(node) as usize)
    }

    fn kind(&self) -> &'static str {
        match self.node.as_deref() {
            None => "constant",
            Some(TagNode::Dirtyable { .. }) => "dirtyable",
            Some(TagNode::Updatable { .. }) => "updatable",
            Some(TagNode::Combinator(_)) => "combinator",
        }
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::CONSTANT
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Tag {}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("kind", &self.kind())
            .field("revision", &self.revision())
            .finish()
    }
}

/// Combine tags into one whose revision is the maximum of its inputs.
///
/// Constant tags are dropped. With nothing left the result is
/// [`Tag::CONSTANT`]; with a single tag left that tag is returned as is.
#[must_use]
pub fn combine(tags: impl IntoIterator<Item = Tag>) -> Tag {
    let mut tags: Vec<Tag> = tags.into_iter().filter(|t| !t.is_constant()).collect();
    if tags.len() <= 1 {
        return tags.pop().unwrap_or(Tag::CONSTANT);
    }
    Tag::from_node(TagNode::Combinator(tags.into_boxed_slice()))
}

// ---------------------------------------------------------------------------
// DirtyableTag
// ---------------------------------------------------------------------------

/// A tag that is invalidated explicitly.
///
/// Bound to the [`Tracker`] it was created from: [`dirty`](Self::dirty)
/// advances that tracker's clock. Once the tracker is dropped, dirtying is a
/// no-op.
#[derive(Clone)]
pub struct DirtyableTag {
    tag: Tag,
    tracker: Weak<TrackerState>,
    label: Option<Rc<str>>,
}

impl DirtyableTag {
    /// Create a dirtyable tag on `tracker`'s clock.
    #[must_use]
    pub fn new(tracker: &Tracker) -> Self {
        Self {
            tag: Tag::from_node(TagNode::Dirtyable {
                revision: Cell::new(Revision::INITIAL),
            }),
            tracker: Rc::downgrade(tracker.state()),
            label: None,
        }
    }

    /// Create a dirtyable tag with a label used in diagnostics.
    #[must_use]
    pub fn labeled(tracker: &Tracker, label: impl Into<Rc<str>>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new(tracker)
        }
    }

    /// The tag handle. Every call returns the same tag.
    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag.clone()
    }

    /// Diagnostic label, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Current revision.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.tag.revision()
    }

    /// Invalidate the tag: advance the clock and stamp the new revision.
    pub fn dirty(&self) {
        let Some(state) = self.tracker.upgrade() else {
            return;
        };
        #[cfg(any(debug_assertions, feature = "debug-checks"))]
        state.check_not_consumed(&self.tag, self.label.as_deref());

        let next = state.advance();
        if let Some(TagNode::Dirtyable { revision }) = self.tag.node.as_deref() {
            revision.set(next);
        }
    }
}

impl fmt::Debug for DirtyableTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtyableTag")
            .field("label", &self.label)
            .field("revision", &self.revision())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// UpdatableTag
// ---------------------------------------------------------------------------

/// A tag with a stable identity whose dependencies can be swapped.
///
/// Used by cached computations: the handle stays the same across
/// recomputations while the subtag is replaced by the latest combined tag.
#[derive(Clone)]
pub struct UpdatableTag {
    tag: Tag,
}

impl UpdatableTag {
    /// Create an updatable tag over the constant tag.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tag: Tag::from_node(TagNode::Updatable {
                revision: Cell::new(Revision::INITIAL),
                subtag: RefCell::new(Tag::CONSTANT),
            }),
        }
    }

    /// The tag handle. Every call returns the same tag.
    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag.clone()
    }

    /// Current revision.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.tag.revision()
    }

    /// The current subtag.
    #[must_use]
    pub fn subtag(&self) -> Tag {
        match self.tag.node.as_deref() {
            Some(TagNode::Updatable { subtag, .. }) => subtag.borrow().clone(),
            _ => Tag::CONSTANT,
        }
    }

    /// Replace the subtag.
    ///
    /// The revision floor is raised to the revision observed before the swap,
    /// so the tag never reports an older revision than it already did.
    pub fn update(&self, next: Tag) {
        if let Some(TagNode::Updatable { revision, subtag }) = self.tag.node.as_deref() {
            let observed = revision.get().max(subtag.borrow().revision());
            revision.set(observed);
            *subtag.borrow_mut() = next;
        }
    }
}

impl Default for UpdatableTag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UpdatableTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatableTag")
            .field("revision", &self.revision())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
