#![forbid(unsafe_code)]

//! Reactive path segments.

use std::fmt;
use std::rc::Rc;

use trellis_validator::Tag;

use crate::children::ChildCache;
use crate::environment::{Environment, ReferenceId};
use crate::error::Result;
use crate::reference::Reference;
use crate::value::Value;

/// `parent[key]` over a reactive parent.
///
/// The value is re-read from the parent on every call, so it always reflects
/// the parent's current value. The tag is the parent's tag.
pub struct PropertyReference {
    env: Environment,
    id: ReferenceId,
    parent: Reference,
    key: Rc<str>,
    children: ChildCache,
}

impl PropertyReference {
    pub(crate) fn child(env: &Environment, parent: Reference, key: &str) -> Reference {
        let id = env.next_reference_id();
        env.set_template_path_debug_context(id, key, parent.id());
        Reference::Property(Rc::new(Self {
            env: env.clone(),
            id,
            parent,
            key: key.into(),
            children: ChildCache::new(env.config().memoize_children),
        }))
    }

    #[must_use]
    pub fn id(&self) -> ReferenceId {
        self.id
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    #[must_use]
    pub fn parent(&self) -> &Reference {
        &self.parent
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn value(&self) -> Result<Value> {
        Ok(self.parent.value()?.property(&self.key))
    }

    pub(crate) fn tag(&self) -> Tag {
        self.parent.tag()
    }

    pub(crate) fn get(self: &Rc<Self>, key: &str) -> Reference {
        let parent = Reference::Property(Rc::clone(self));
        self.children
            .get_or_insert_with(key, || Self::child(&self.env, parent, key))
    }
}

impl fmt::Debug for PropertyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyReference")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("parent", &self.parent.id())
            .finish()
    }
}

impl Drop for PropertyReference {
    fn drop(&mut self) {
        self.env.clear_template_path_debug_context(self.id);
    }
}
