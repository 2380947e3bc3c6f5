#![forbid(unsafe_code)]

//! Arguments captured at a helper call site.
//!
//! # Invariants
//!
//! 1. The set of argument references never changes after capture; only the
//!    values behind them do.
//! 2. Named argument keys are unique.

use std::fmt;
use std::rc::Rc;

use ahash::AHashSet;
use trellis_validator::{Tag, combine};

use crate::error::{ReferenceError, Result};
use crate::reference::Reference;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Positional
// ---------------------------------------------------------------------------

/// Ordered argument references.
#[derive(Clone, Default)]
pub struct PositionalArguments {
    references: Rc<[Reference]>,
}

impl PositionalArguments {
    #[must_use]
    pub fn new(references: impl IntoIterator<Item = Reference>) -> Self {
        Self {
            references: references.into_iter().collect(),
        }
    }

    /// Argument at `index`; out of range resolves to an undefined reference.
    #[must_use]
    pub fn at(&self, index: usize) -> Reference {
        self.references
            .get(index)
            .cloned()
            .unwrap_or_else(Reference::undefined)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.references.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter()
    }

    /// Combined tag of every argument.
    #[must_use]
    pub fn tag(&self) -> Tag {
        combine(self.references.iter().map(Reference::tag))
    }

    /// Resolve every argument, in order.
    ///
    /// # Errors
    ///
    /// The first error raised by an argument.
    pub fn value(&self) -> Result<Vec<Value>> {
        self.references.iter().map(Reference::value).collect()
    }
}

impl fmt::Debug for PositionalArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.references.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// Named
// ---------------------------------------------------------------------------

/// Named argument references in capture order.
#[derive(Clone, Default)]
pub struct NamedArguments {
    entries: Rc<[(Rc<str>, Reference)]>,
}

impl NamedArguments {
    /// Capture named arguments.
    ///
    /// # Errors
    ///
    /// [`ReferenceError::DuplicateNamedArgument`] when a name repeats.
    pub fn new<K: Into<Rc<str>>>(
        entries: impl IntoIterator<Item = (K, Reference)>,
    ) -> Result<Self> {
        let mut seen = AHashSet::new();
        let mut captured = Vec::new();
        for (name, reference) in entries {
            let name: Rc<str> = name.into();
            if !seen.insert(Rc::clone(&name)) {
                return Err(ReferenceError::DuplicateNamedArgument {
                    name: name.to_string(),
                });
            }
            captured.push((name, reference));
        }
        Ok(Self {
            entries: captured.into(),
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Reference> {
        self.entries
            .iter()
            .find(|(key, _)| &**key == name)
            .map(|(_, reference)| reference)
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| &**key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Combined tag of every argument.
    #[must_use]
    pub fn tag(&self) -> Tag {
        combine(self.entries.iter().map(|(_, reference)| reference.tag()))
    }

    /// Resolve every argument.
    ///
    /// # Errors
    ///
    /// The first error raised by an argument.
    pub fn value(&self) -> Result<NamedValues> {
        let entries = self
            .entries
            .iter()
            .map(|(key, reference)| Ok((Rc::clone(key), reference.value()?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(NamedValues { entries })
    }
}

impl fmt::Debug for NamedArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

/// Resolved named arguments, as handed to a helper.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedValues {
    entries: Vec<(Rc<str>, Value)>,
}

impl NamedValues {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| &**key == name)
            .map(|(_, value)| value)
    }

    /// Value of `name`, undefined when absent.
    #[must_use]
    pub fn get_or_undefined(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (&**key, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<Rc<str>>, V: Into<Value>> FromIterator<(K, V)> for NamedValues {
    /// Later entries replace earlier ones with the same name.
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut entries: Vec<(Rc<str>, Value)> = Vec::new();
        for (key, value) in iter {
            let key = key.into();
            let value = value.into();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        Self { entries }
    }
}

// ---------------------------------------------------------------------------
// Captured
// ---------------------------------------------------------------------------

/// Positional and named argument references bound at a call site.
#[derive(Debug, Clone, Default)]
pub struct CapturedArguments {
    pub positional: PositionalArguments,
    pub named: NamedArguments,
}

impl CapturedArguments {
    #[must_use]
    pub fn new(positional: PositionalArguments, named: NamedArguments) -> Self {
        Self { positional, named }
    }

    /// Positional-only arguments.
    #[must_use]
    pub fn positional(references: impl IntoIterator<Item = Reference>) -> Self {
        Self {
            positional: PositionalArguments::new(references),
            named: NamedArguments::default(),
        }
    }

    /// Combined tag of every argument.
    #[must_use]
    pub fn tag(&self) -> Tag {
        combine([self.positional.tag(), self.named.tag()])
    }

    /// Total number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    #[test]
    fn duplicate_named_argument_rejected() {
        let env = Environment::default();
        let err = NamedArguments::new([
            ("a", Reference::unbound(&env, 1)),
            ("a", Reference::unbound(&env, 2)),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ReferenceError::DuplicateNamedArgument { ref name } if name == "a"
        ));
    }

    #[test]
    fn positional_out_of_range_is_undefined() {
        let env = Environment::default();
        let args = PositionalArguments::new([Reference::unbound(&env, "x")]);
        assert_eq!(args.len(), 1);
        assert!(args.at(5).value().unwrap().is_undefined());
    }

    #[test]
    fn named_values_keep_capture_order() {
        let env = Environment::default();
        let named = NamedArguments::new([
            ("z", Reference::unbound(&env, 1)),
            ("a", Reference::unbound(&env, 2)),
        ])
        .unwrap();
        assert_eq!(named.names().collect::<Vec<_>>(), ["z", "a"]);

        let values = named.value().unwrap();
        assert_eq!(values.get("a"), Some(&Value::from(2)));
        assert!(values.get_or_undefined("missing").is_undefined());
    }

    #[test]
    fn unbound_arguments_have_constant_tag() {
        let env = Environment::default();
        let args = CapturedArguments::positional([
            Reference::unbound(&env, "a"),
            Reference::unbound(&env, "b"),
        ]);
        assert!(args.tag().is_constant());
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn named_values_from_iter_replaces_duplicates() {
        let values: NamedValues = [("a", 1), ("b", 2), ("a", 3)].into_iter().collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values.get("a"), Some(&Value::from(3)));
    }
}
