#![forbid(unsafe_code)]

//! Revision numbers.

use std::fmt;

/// A point on a [`Tracker`](crate::Tracker)'s clock.
///
/// Revisions are only comparable when they come from the same tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Revision(pub u64);

impl Revision {
    /// Revision of the constant tag. Lower than anything a clock produces.
    pub const CONSTANT: Self = Self(0);

    /// First revision of a fresh clock.
    pub const INITIAL: Self = Self(1);

    /// Get the raw revision value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[must_use]
    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}
