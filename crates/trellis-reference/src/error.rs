#![forbid(unsafe_code)]

//! Errors raised while evaluating or updating references.

use thiserror::Error;
use trellis_validator::TrackingError;

use crate::reference::ReferenceKind;

pub type Result<T> = std::result::Result<T, ReferenceError>;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("cyclic dependency: {reference} was read while it was being computed")]
    CyclicDependency { reference: String },

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error("cannot update {reference}: it is read-only")]
    ReadonlyWrite { reference: String },

    #[error("cannot update {reference}: {kind} references are not updatable")]
    NotUpdatable {
        reference: String,
        kind: ReferenceKind,
    },

    #[error("duplicate named argument: {name}")]
    DuplicateNamedArgument { name: String },

    /// Error raised by a helper's compute function, untouched.
    #[error(transparent)]
    Helper(Box<dyn std::error::Error + 'static>),
}

impl ReferenceError {
    /// The error a helper raised, if this is one.
    #[must_use]
    pub fn helper_error(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Helper(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }

    /// Whether this error is, or was caused by, a cyclic evaluation.
    ///
    /// Looks through helper errors, since a cycle detected inside a nested
    /// helper reaches the caller wrapped by every helper in between.
    #[must_use]
    pub fn is_cyclic_dependency(&self) -> bool {
        match self {
            Self::CyclicDependency { .. } => true,
            Self::Helper(inner) => inner
                .downcast_ref::<Self>()
                .is_some_and(Self::is_cyclic_dependency),
            _ => false,
        }
    }
}
