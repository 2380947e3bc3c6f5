#![forbid(unsafe_code)]

//! Reactive root references.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use trellis_validator::{DirtyableTag, Tag};

use crate::children::ChildCache;
use crate::environment::{Environment, ReferenceId};
use crate::property::PropertyReference;
use crate::reference::Reference;
use crate::value::Value;

/// A root whose value can be replaced, e.g. a component's `this`.
///
/// Reads consume the reference's dirtyable tag; [`set`](Self::set) dirties
/// it. In-place mutation of a structured value is invisible until
/// [`notify`](Self::notify) is called.
pub struct UpdatableReference {
    env: Environment,
    id: ReferenceId,
    value: RefCell<Value>,
    tag: DirtyableTag,
    children: ChildCache,
}

impl UpdatableReference {
    pub(crate) fn root(env: &Environment, value: Value) -> Rc<Self> {
        let id = env.next_reference_id();
        env.set_template_path_debug_context(id, "this", None);
        Rc::new(Self {
            tag: DirtyableTag::labeled(env.tracker(), format!("this{id}")),
            children: ChildCache::new(env.config().memoize_children),
            env: env.clone(),
            id,
            value: RefCell::new(value),
        })
    }

    #[must_use]
    pub fn id(&self) -> ReferenceId {
        self.id
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Current value; the read is recorded in the active frame.
    #[must_use]
    pub fn value(&self) -> Value {
        self.env.tracker().consume(&self.tag.tag());
        self.value.borrow().clone()
    }

    /// Current value without recording the read.
    #[must_use]
    pub fn peek(&self) -> Value {
        self.value.borrow().clone()
    }

    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag.tag()
    }

    /// Replace the value. Setting an equal value changes nothing.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        if *self.value.borrow() == value {
            return;
        }
        *self.value.borrow_mut() = value;
        self.tag.dirty();
        tracing::trace!(
            message = "reference.set",
            reference = self.id.raw(),
            revision = self.tag.revision().raw()
        );
    }

    /// Invalidate readers after mutating the current value in place.
    pub fn notify(&self) {
        self.tag.dirty();
    }

    pub(crate) fn get(self: &Rc<Self>, key: &str) -> Reference {
        let parent = Reference::Updatable(Rc::clone(self));
        self.children
            .get_or_insert_with(key, || PropertyReference::child(&self.env, parent, key))
    }
}

impl fmt::Debug for UpdatableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatableReference")
            .field("id", &self.id)
            .field("value", &self.value.borrow())
            .field("tag", &self.tag)
            .finish()
    }
}

impl Drop for UpdatableReference {
    fn drop(&mut self) {
        self.env.clear_template_path_debug_context(self.id);
    }
}
