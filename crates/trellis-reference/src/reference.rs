#![forbid(unsafe_code)]

//! The reference sum type.
//!
//! # Design
//!
//! [`Reference`] is a closed enum over every reference kind. Each operation
//! matches on the variant and forwards to that kind's own implementation, so
//! the set of behaviors is visible in one place and checked exhaustively.
//!
//! Cloning a reference clones a handle: clones are the [`same`](Reference::same)
//! reference. Primitive references are the exception; they compare by value.
//!
//! | Kind        | `value()`                     | `tag()`                 | `get(key)`          |
//! |-------------|-------------------------------|-------------------------|---------------------|
//! | unbound     | captured value                | constant                | unbound / primitive |
//! | primitive   | the primitive                 | constant                | primitive           |
//! | updatable   | current value, tracked        | own dirtyable tag       | property            |
//! | property    | `parent.value()[key]`         | parent's tag            | property            |
//! | readonly    | inner's value                 | inner's tag (aliased)   | inner's `get`       |
//! | helper      | memoized helper result        | own updatable tag       | property            |

use std::fmt;
use std::rc::Rc;

use trellis_validator::Tag;

use crate::args::CapturedArguments;
use crate::environment::{Environment, ReferenceId};
use crate::error::{ReferenceError, Result};
use crate::helper::Helper;
use crate::invocation::HelperInvocationReference;
use crate::primitive::PrimitiveReference;
use crate::property::PropertyReference;
use crate::readonly::ReadonlyReference;
use crate::unbound::UnboundReference;
use crate::updatable::UpdatableReference;
use crate::value::Value;

/// Which variant a [`Reference`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Unbound,
    Primitive,
    Updatable,
    Property,
    Readonly,
    Helper,
}

impl ReferenceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unbound => "unbound",
            Self::Primitive => "primitive",
            Self::Updatable => "updatable",
            Self::Property => "property",
            Self::Readonly => "readonly",
            Self::Helper => "helper",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lazily evaluated node exposing a value, a validity tag and children.
#[derive(Clone)]
pub enum Reference {
    Unbound(Rc<UnboundReference>),
    Primitive(PrimitiveReference),
    Updatable(Rc<UpdatableReference>),
    Property(Rc<PropertyReference>),
    Readonly(Rc<ReadonlyReference>),
    Helper(Rc<HelperInvocationReference>),
}

impl Reference {
    /// Root reference over a fixed value.
    pub fn unbound(env: &Environment, value: impl Into<Value>) -> Self {
        Self::Unbound(UnboundReference::root(env, value.into()))
    }

    /// Reference over a primitive value, compared by value.
    pub fn primitive(value: impl Into<Value>) -> Self {
        Self::Primitive(PrimitiveReference::new(value))
    }

    /// Reference over the absent value.
    #[must_use]
    pub fn undefined() -> Self {
        Self::Primitive(PrimitiveReference::UNDEFINED)
    }

    /// Reactive root whose value can be replaced with [`update`](Self::update).
    pub fn updatable(env: &Environment, value: impl Into<Value>) -> Self {
        Self::Updatable(UpdatableReference::root(env, value.into()))
    }

    /// Read-only view of `inner`. Wrapping a readonly reference returns it
    /// unchanged.
    #[must_use]
    pub fn readonly(inner: &Self) -> Self {
        match inner {
            Self::Readonly(_) => inner.clone(),
            other => Self::Readonly(Rc::new(ReadonlyReference::new(other.clone()))),
        }
    }

    /// Invocation of `helper` over `args`.
    pub fn helper(env: &Environment, helper: impl Into<Helper>, args: CapturedArguments) -> Self {
        Self::Helper(HelperInvocationReference::new(env, helper.into(), args))
    }

    #[must_use]
    pub fn kind(&self) -> ReferenceKind {
        match self {
            Self::Unbound(_) => ReferenceKind::Unbound,
            Self::Primitive(_) => ReferenceKind::Primitive,
            Self::Updatable(_) => ReferenceKind::Updatable,
            Self::Property(_) => ReferenceKind::Property,
            Self::Readonly(_) => ReferenceKind::Readonly,
            Self::Helper(_) => ReferenceKind::Helper,
        }
    }

    /// Current value. Tags read while computing it are consumed by the
    /// environment's innermost open frame.
    ///
    /// # Errors
    ///
    /// [`ReferenceError::CyclicDependency`] when a helper reads its own
    /// value, [`ReferenceError::Tracking`] when nesting exceeds the tracker's
    /// depth limit, and any error a helper raises.
    pub fn value(&self) -> Result<Value> {
        match self {
            Self::Unbound(reference) => Ok(reference.value().clone()),
            Self::Primitive(reference) => Ok(reference.value().clone()),
            Self::Updatable(reference) => Ok(reference.value()),
            Self::Property(reference) => reference.value(),
            Self::Readonly(reference) => reference.inner().value(),
            Self::Helper(reference) => reference.value(),
        }
    }

    /// Validity tag. Repeated calls return the same tag.
    #[must_use]
    pub fn tag(&self) -> Tag {
        match self {
            Self::Unbound(_) | Self::Primitive(_) => Tag::CONSTANT,
            Self::Updatable(reference) => reference.tag(),
            Self::Property(reference) => reference.tag(),
            Self::Readonly(reference) => reference.tag(),
            Self::Helper(reference) => reference.tag(),
        }
    }

    /// Child reference for `key`. Never fails: missing keys resolve to an
    /// undefined value when read.
    #[must_use]
    pub fn get(&self, key: &str) -> Self {
        match self {
            Self::Unbound(reference) => reference.get(key),
            Self::Primitive(reference) => Self::Primitive(reference.get(key)),
            Self::Updatable(reference) => reference.get(key),
            Self::Property(reference) => reference.get(key),
            Self::Readonly(reference) => reference.inner().get(key),
            Self::Helper(reference) => reference.get(key),
        }
    }

    /// Resolve a dotted path such as `user.name`. Empty segments are skipped.
    #[must_use]
    pub fn path(&self, dotted: &str) -> Self {
        reference_from_parts(self, dotted.split('.').filter(|part| !part.is_empty()))
    }

    /// Replace the value behind an updatable reference.
    ///
    /// # Errors
    ///
    /// [`ReferenceError::ReadonlyWrite`] through a readonly reference,
    /// [`ReferenceError::NotUpdatable`] for every other kind.
    pub fn update(&self, value: impl Into<Value>) -> Result<()> {
        match self {
            Self::Updatable(reference) => {
                reference.set(value);
                Ok(())
            }
            Self::Readonly(_) => Err(ReferenceError::ReadonlyWrite {
                reference: self.describe(),
            }),
            _ => Err(ReferenceError::NotUpdatable {
                reference: self.describe(),
                kind: self.kind(),
            }),
        }
    }

    /// Whether both are the same reference. Primitives compare by value.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unbound(a), Self::Unbound(b)) => Rc::ptr_eq(a, b),
            (Self::Primitive(a), Self::Primitive(b)) => a == b,
            (Self::Updatable(a), Self::Updatable(b)) => Rc::ptr_eq(a, b),
            (Self::Property(a), Self::Property(b)) => Rc::ptr_eq(a, b),
            (Self::Readonly(a), Self::Readonly(b)) => Rc::ptr_eq(a, b),
            (Self::Helper(a), Self::Helper(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Identifier within the environment. Primitives have none; readonly
    /// references answer with their inner reference's id.
    #[must_use]
    pub fn id(&self) -> Option<ReferenceId> {
        match self {
            Self::Unbound(reference) => Some(reference.id()),
            Self::Primitive(_) => None,
            Self::Updatable(reference) => Some(reference.id()),
            Self::Property(reference) => Some(reference.id()),
            Self::Readonly(reference) => reference.inner().id(),
            Self::Helper(reference) => Some(reference.id()),
        }
    }

    /// The environment this reference belongs to. Primitives have none.
    #[must_use]
    pub fn environment(&self) -> Option<&Environment> {
        match self {
            Self::Unbound(reference) => Some(reference.environment()),
            Self::Primitive(_) => None,
            Self::Updatable(reference) => Some(reference.environment()),
            Self::Property(reference) => Some(reference.environment()),
            Self::Readonly(reference) => reference.inner().environment(),
            Self::Helper(reference) => Some(reference.environment()),
        }
    }

    /// Template path registered for this reference, debug builds only.
    #[must_use]
    pub fn debug_path(&self) -> Option<String> {
        let id = self.id()?;
        self.environment()?.template_path(id)
    }

    /// Human-readable name for errors: the template path when known,
    /// otherwise kind and id.
    #[must_use]
    pub fn describe(&self) -> String {
        if let Some(path) = self.debug_path() {
            return format!("`{path}`");
        }
        match self.id() {
            Some(id) => format!("{} reference {id}", self.kind()),
            None => format!("{} reference", self.kind()),
        }
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Reference");
        out.field("kind", &self.kind());
        if let Some(id) = self.id() {
            out.field("id", &id);
        }
        if let Some(path) = self.debug_path() {
            out.field("path", &path);
        }
        if let Self::Primitive(reference) = self {
            out.field("value", reference.value());
        }
        out.finish()
    }
}

impl From<PrimitiveReference> for Reference {
    fn from(reference: PrimitiveReference) -> Self {
        Self::Primitive(reference)
    }
}

/// Follow `parts` from `root`, one `get` per segment.
#[must_use]
pub fn reference_from_parts<I>(root: &Reference, parts: I) -> Reference
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut reference = root.clone();
    for part in parts {
        reference = reference.get(part.as_ref());
    }
    reference
}
