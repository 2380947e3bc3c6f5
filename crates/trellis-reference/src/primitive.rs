#![forbid(unsafe_code)]

//! Stable references over immutable primitive values.

use crate::value::Value;

/// A reference over a primitive (or absent) value.
///
/// Equality is by value: two primitive references over `"Jill"` are the same
/// reference. The tag is always constant.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveReference {
    value: Value,
}

impl PrimitiveReference {
    /// Reference over the absent value.
    pub const UNDEFINED: Self = Self {
        value: Value::Undefined,
    };

    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Child over `value.property(key)`. Strings answer `length`; everything
    /// else resolves to undefined.
    #[must_use]
    pub fn get(&self, key: &str) -> Self {
        Self::new(self.value.property(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_value() {
        assert_eq!(PrimitiveReference::new("Jill"), PrimitiveReference::new("Jill"));
        assert_ne!(PrimitiveReference::new("Jill"), PrimitiveReference::new("Jack"));
        assert_eq!(PrimitiveReference::UNDEFINED, PrimitiveReference::new(Value::Undefined));
    }

    #[test]
    fn property_access_never_fails() {
        let name = PrimitiveReference::new("Jill");
        assert_eq!(name.get("length").value(), &Value::from(4));
        assert!(name.get("missing").value().is_undefined());
        assert!(PrimitiveReference::new(3).get("x").get("y").value().is_undefined());
    }
}
