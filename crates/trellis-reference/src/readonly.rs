#![forbid(unsafe_code)]

//! Read-only views.

use std::fmt;

use trellis_validator::Tag;

use crate::reference::Reference;

/// Aliases an inner reference while refusing writes through it.
///
/// Read-only-ness is shallow: [`Reference::get`] on a readonly reference
/// returns the inner reference's child as is, without wrapping it again.
pub struct ReadonlyReference {
    inner: Reference,
    tag: Tag,
}

impl ReadonlyReference {
    pub(crate) fn new(inner: Reference) -> Self {
        Self {
            tag: inner.tag(),
            inner,
        }
    }

    #[must_use]
    pub fn inner(&self) -> &Reference {
        &self.inner
    }

    /// The inner reference's tag: the same handle, not a copy.
    pub(crate) fn tag(&self) -> Tag {
        self.tag.clone()
    }
}

impl fmt::Debug for ReadonlyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadonlyReference")
            .field("inner", &self.inner)
            .finish()
    }
}
