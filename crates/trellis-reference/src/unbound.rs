#![forbid(unsafe_code)]

//! References over fixed, non-reactive values.

use std::fmt;
use std::rc::Rc;

use crate::children::ChildCache;
use crate::environment::{Environment, ReferenceId};
use crate::primitive::PrimitiveReference;
use crate::reference::Reference;
use crate::value::Value;

/// A reference whose value is fixed at construction.
///
/// The value is never re-read or revalidated and the tag is constant, so
/// reads through an unbound chain cost no tracking at all.
pub struct UnboundReference {
    env: Environment,
    id: ReferenceId,
    value: Value,
    children: ChildCache,
}

impl UnboundReference {
    /// Root reference over `value`, registered as `this`.
    pub(crate) fn root(env: &Environment, value: Value) -> Rc<Self> {
        let reference = Self::new(env, value);
        env.set_template_path_debug_context(reference.id, "this", None);
        Rc::new(reference)
    }

    fn new(env: &Environment, value: Value) -> Self {
        Self {
            id: env.next_reference_id(),
            children: ChildCache::new(env.config().memoize_children),
            env: env.clone(),
            value,
        }
    }

    #[must_use]
    pub fn id(&self) -> ReferenceId {
        self.id
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// The captured value, unchanged.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Child over `value[key]`.
    ///
    /// Structured values yield an unbound child; primitives yield a
    /// primitive reference. Missing keys resolve to undefined.
    ///
    /// With child memoization on, `value[key]` is read once, when the child
    /// is first created. An in-place change to the captured object after that
    /// is not seen by a repeated `get(key)`; disable
    /// [`memoize_children`](crate::EnvironmentConfig::memoize_children) to
    /// re-read the key on every call.
    pub(crate) fn get(&self, key: &str) -> Reference {
        if !self.value.is_structured() {
            return Reference::Primitive(PrimitiveReference::new(self.value.property(key)));
        }
        self.children.get_or_insert_with(key, || {
            let child = Self::new(&self.env, self.value.property(key));
            self.env
                .set_template_path_debug_context(child.id, key, Some(self.id));
            Reference::Unbound(Rc::new(child))
        })
    }
}

impl fmt::Debug for UnboundReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnboundReference")
            .field("id", &self.id)
            .field("value", &self.value)
            .finish()
    }
}

impl Drop for UnboundReference {
    fn drop(&mut self) {
        self.env.clear_template_path_debug_context(self.id);
    }
}
