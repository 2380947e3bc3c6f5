#![forbid(unsafe_code)]

//! Helpers: the user functions a helper invocation wraps.
//!
//! Two shapes exist. A [`SimpleHelper`] is a named, stateless compute
//! function. A [`HelperInstance`] is a stateful object; it may expose a
//! recompute tag that it dirties when its internal state changes (a clock
//! ticking, a cache expiring).

use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

use trellis_validator::{DirtyableTag, Tag};

use crate::args::NamedValues;
use crate::environment::Environment;
use crate::error::ReferenceError;
use crate::value::Value;

/// Result of a helper's compute function.
pub type HelperResult = std::result::Result<Value, HelperError>;

type ComputeFn = dyn Fn(&[Value], &NamedValues) -> HelperResult;

// ---------------------------------------------------------------------------
// HelperError
// ---------------------------------------------------------------------------

/// Error raised by a helper.
///
/// Wraps the original error without altering it. Any error type converts
/// with `?`, and [`ReferenceError`]s raised by nested reads pass back out
/// unchanged.
pub struct HelperError {
    inner: Box<dyn StdError + 'static>,
}

impl HelperError {
    /// Error carrying only a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self {
            inner: Box::new(MessageError(message.to_string())),
        }
    }

    /// The original error, if it is an `E`.
    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    #[must_use]
    pub fn into_inner(self) -> Box<dyn StdError + 'static> {
        self.inner
    }
}

impl<E: StdError + 'static> From<E> for HelperError {
    fn from(error: E) -> Self {
        Self {
            inner: Box::new(error),
        }
    }
}

impl fmt::Debug for HelperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for HelperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl From<HelperError> for ReferenceError {
    fn from(error: HelperError) -> Self {
        match error.inner.downcast::<ReferenceError>() {
            Ok(reference_error) => *reference_error,
            Err(inner) => ReferenceError::Helper(inner),
        }
    }
}

/// Message-only helper error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageError(pub String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A named stateless compute function.
#[derive(Clone)]
pub struct SimpleHelper {
    name: Rc<str>,
    compute: Rc<ComputeFn>,
}

impl SimpleHelper {
    pub fn new(
        name: impl Into<Rc<str>>,
        compute: impl Fn(&[Value], &NamedValues) -> HelperResult + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            compute: Rc::new(compute),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for SimpleHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleHelper")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A stateful helper.
pub trait HelperInstance {
    /// Compute the helper's value from resolved arguments.
    fn compute(&self, positional: &[Value], named: &NamedValues) -> HelperResult;

    /// Tag dirtied when the helper's own state changes.
    fn recompute_tag(&self) -> Option<Tag> {
        None
    }

    /// Name used in logs and diagnostics.
    fn debug_name(&self) -> &str {
        "helper"
    }
}

/// Either helper shape.
#[derive(Clone)]
pub enum Helper {
    Simple(SimpleHelper),
    Instance(Rc<dyn HelperInstance>),
}

impl Helper {
    pub fn simple(
        name: impl Into<Rc<str>>,
        compute: impl Fn(&[Value], &NamedValues) -> HelperResult + 'static,
    ) -> Self {
        Self::Simple(SimpleHelper::new(name, compute))
    }

    pub fn instance(instance: impl HelperInstance + 'static) -> Self {
        Self::Instance(Rc::new(instance))
    }

    #[must_use]
    pub fn debug_name(&self) -> &str {
        match self {
            Self::Simple(helper) => helper.name(),
            Self::Instance(instance) => instance.debug_name(),
        }
    }

    /// The instance's recompute tag. Simple helpers have none.
    #[must_use]
    pub fn recompute_tag(&self) -> Option<Tag> {
        match self {
            Self::Simple(_) => None,
            Self::Instance(instance) => instance.recompute_tag(),
        }
    }

    /// Run the helper.
    ///
    /// # Errors
    ///
    /// Whatever the helper raises.
    pub fn compute(&self, positional: &[Value], named: &NamedValues) -> HelperResult {
        match self {
            Self::Simple(helper) => (helper.compute)(positional, named),
            Self::Instance(instance) => instance.compute(positional, named),
        }
    }
}

impl From<SimpleHelper> for Helper {
    fn from(helper: SimpleHelper) -> Self {
        Self::Simple(helper)
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(helper) => fmt::Debug::fmt(helper, f),
            Self::Instance(instance) => f
                .debug_struct("HelperInstance")
                .field("name", &instance.debug_name())
                .finish_non_exhaustive(),
        }
    }
}

// ---------------------------------------------------------------------------
// RecomputeTag
// ---------------------------------------------------------------------------

/// Invalidation source for a stateful helper's internal state.
#[derive(Debug, Clone)]
pub struct RecomputeTag {
    tag: DirtyableTag,
}

impl RecomputeTag {
    #[must_use]
    pub fn new(env: &Environment) -> Self {
        Self {
            tag: DirtyableTag::labeled(env.tracker(), "recompute"),
        }
    }

    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag.tag()
    }

    /// Mark the helper's output stale.
    pub fn recompute(&self) {
        self.tag.dirty();
    }
}
