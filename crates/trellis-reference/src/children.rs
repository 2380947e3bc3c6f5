#![forbid(unsafe_code)]

//! Per-reference memo of `get(key)` results.
//!
//! Property children hold a strong handle to their parent, so the cache only
//! keeps a weak handle to them. Every other child kind is held strongly.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::property::PropertyReference;
use crate::reference::Reference;

enum CachedChild {
    Strong(Reference),
    Property(Weak<PropertyReference>),
}

impl CachedChild {
    fn of(reference: &Reference) -> Self {
        match reference {
            Reference::Property(child) => Self::Property(Rc::downgrade(child)),
            other => Self::Strong(other.clone()),
        }
    }

    fn upgrade(&self) -> Option<Reference> {
        match self {
            Self::Strong(reference) => Some(reference.clone()),
            Self::Property(weak) => weak.upgrade().map(Reference::Property),
        }
    }
}

pub(crate) struct ChildCache {
    enabled: bool,
    children: RefCell<AHashMap<Rc<str>, CachedChild>>,
}

impl ChildCache {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            children: RefCell::new(AHashMap::new()),
        }
    }

    /// Return the cached child for `key`, or build one with `make`.
    ///
    /// `make` runs without the cache borrowed, so it may call back into the
    /// owning reference.
    pub(crate) fn get_or_insert_with(
        &self,
        key: &str,
        make: impl FnOnce() -> Reference,
    ) -> Reference {
        if !self.enabled {
            return make();
        }
        let hit = self.children.borrow().get(key).and_then(CachedChild::upgrade);
        if let Some(child) = hit {
            return child;
        }
        let child = make();
        self.children
            .borrow_mut()
            .insert(key.into(), CachedChild::of(&child));
        child
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.children.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::PrimitiveReference;
    use crate::value::Value;

    #[test]
    fn memoizes_when_enabled() {
        let cache = ChildCache::new(true);
        let mut built = 0;
        let first = cache.get_or_insert_with("a", || {
            built += 1;
            Reference::Primitive(PrimitiveReference::new(Value::from(1)))
        });
        let second = cache.get_or_insert_with("a", || {
            built += 1;
            Reference::Primitive(PrimitiveReference::new(Value::from(2)))
        });
        assert_eq!(built, 1);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn rebuilds_when_disabled() {
        let cache = ChildCache::new(false);
        let mut built = 0;
        for _ in 0..3 {
            let _ = cache.get_or_insert_with("a", || {
                built += 1;
                Reference::Primitive(PrimitiveReference::UNDEFINED)
            });
        }
        assert_eq!(built, 3);
        assert_eq!(cache.len(), 0);
    }
}
