#![forbid(unsafe_code)]

//! Dynamic values flowing through references.
//!
//! # Design
//!
//! Primitives (`Undefined`, `Null`, `Bool`, `Number`, `Str`) are immutable
//! and compare by value. Structured values ([`Object`], [`List`]) are shared,
//! interior-mutable containers that compare by identity, the way host objects
//! handed to a template behave.
//!
//! Every structured container counts its own mutations. Debug builds use the
//! counters to notice a helper that mutates the arguments it was given.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A value produced by a reference.
#[derive(Clone, Default)]
pub enum Value {
    /// The absent value: missing keys and out-of-range indices resolve here.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(Object),
    List(List),
}

impl Value {
    /// Build a string value.
    #[must_use]
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Self::Str(s.into())
    }

    /// Whether property access descends into this value.
    #[inline]
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Object(_) | Self::List(_))
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Template truthiness: `false`, `0`, `NaN`, empty strings, empty lists,
    /// `null` and `undefined` are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Object(_) => true,
            Self::List(list) => !list.is_empty(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&List> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Read `key` from this value.
    ///
    /// Objects look the key up; lists accept numeric indices and `length`;
    /// strings expose `length`. Anything else, including missing keys,
    /// resolves to [`Value::Undefined`].
    #[must_use]
    pub fn property(&self, key: &str) -> Value {
        match self {
            Self::Object(object) => object.get(key).unwrap_or_default(),
            Self::List(list) => {
                if key == "length" {
                    return Self::Number(list.len() as f64);
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| list.get(index))
                    .unwrap_or_default()
            }
            Self::Str(s) if key == "length" => Self::Number(s.chars().count() as f64),
            _ => Self::Undefined,
        }
    }

    /// Short name of the variant, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
            Self::List(_) => "list",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.same(b),
            (Self::List(a), Self::List(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Object(o) => fmt::Debug::fmt(o, f),
            Self::List(l) => fmt::Debug::fmt(l, f),
        }
    }
}

/// Text form used when a value is interpolated into a string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined | Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => fmt_number(*n, f),
            Self::Str(s) => f.write_str(s),
            Self::Object(_) => f.write_str("[object]"),
            Self::List(list) => {
                for (i, item) in list.to_vec().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    match item {
                        Self::List(_) => f.write_str("[list]")?,
                        other => write!(f, "{other}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Self::Str(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

impl From<List> for Value {
    fn from(l: List) -> Self {
        Self::List(l)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Undefined, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

struct ObjectInner {
    entries: RefCell<BTreeMap<Rc<str>, Value>>,
    mutations: Cell<u64>,
}

/// Shared, string-keyed container. Clones are handles to the same object.
#[derive(Clone)]
pub struct Object {
    inner: Rc<ObjectInner>,
}

impl Object {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                entries: RefCell::new(BTreeMap::new()),
                mutations: Cell::new(0),
            }),
        }
    }

    /// Read `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.entries.borrow().get(key).cloned()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.entries.borrow().contains_key(key)
    }

    /// Insert or replace `key`, returning the previous value.
    pub fn insert(&self, key: impl Into<Rc<str>>, value: impl Into<Value>) -> Option<Value> {
        self.bump();
        self.inner
            .entries
            .borrow_mut()
            .insert(key.into(), value.into())
    }

    /// Remove `key`, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.bump();
        self.inner.entries.borrow_mut().remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    /// Keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.inner.entries.borrow().keys().cloned().collect()
    }

    /// Identity comparison.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of mutations applied so far.
    #[must_use]
    pub fn mutation_count(&self) -> u64 {
        self.inner.mutations.get()
    }

    #[cfg(any(debug_assertions, feature = "debug-checks"))]
    fn identity(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    fn bump(&self) {
        let mutations = &self.inner.mutations;
        mutations.set(mutations.get().wrapping_add(1));
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<Rc<str>>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Self::new();
        {
            let mut entries = object.inner.entries.borrow_mut();
            for (k, v) in iter {
                entries.insert(k.into(), v.into());
            }
        }
        object
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object").field("keys", &self.keys()).finish()
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

struct ListInner {
    items: RefCell<Vec<Value>>,
    mutations: Cell<u64>,
}

/// Shared, ordered container. Clones are handles to the same list.
#[derive(Clone)]
pub struct List {
    inner: Rc<ListInner>,
}

impl List {
    #[must_use]
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    #[must_use]
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(ListInner {
                items: RefCell::new(items),
                mutations: Cell::new(0),
            }),
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.bump();
        self.inner.items.borrow_mut().push(value.into());
    }

    /// Replace the item at `index`. Returns `false` when out of range.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> bool {
        let mut items = self.inner.items.borrow_mut();
        let Some(slot) = items.get_mut(index) else {
            return false;
        };
        *slot = value.into();
        drop(items);
        self.bump();
        true
    }

    pub fn pop(&self) -> Option<Value> {
        self.bump();
        self.inner.items.borrow_mut().pop()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Copy of the current items.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    /// Identity comparison.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of mutations applied so far.
    #[must_use]
    pub fn mutation_count(&self) -> u64 {
        self.inner.mutations.get()
    }

    #[cfg(any(debug_assertions, feature = "debug-checks"))]
    fn identity(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    fn bump(&self) {
        let mutations = &self.inner.mutations;
        mutations.set(mutations.get().wrapping_add(1));
    }
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Into<Value>> FromIterator<V> for List {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List").field("len", &self.len()).finish()
    }
}

// ---------------------------------------------------------------------------
// Mutation fingerprints
// ---------------------------------------------------------------------------

/// Mutation counters of every container reachable from `values`, in
/// traversal order. Two equal fingerprints mean nothing was mutated between
/// them.
#[cfg(any(debug_assertions, feature = "debug-checks"))]
pub(crate) fn mutation_fingerprint<'a>(values: impl IntoIterator<Item = &'a Value>) -> Vec<(usize, u64)> {
    let mut seen = ahash::AHashSet::new();
    let mut out = Vec::new();
    let mut stack: Vec<Value> = values.into_iter().cloned().collect();
    while let Some(value) = stack.pop() {
        match value {
            Value::Object(object) => {
                if seen.insert(object.identity()) {
                    out.push((object.identity(), object.mutation_count()));
                    stack.extend(object.inner.entries.borrow().values().cloned());
                }
            }
            Value::List(list) => {
                if seen.insert(list.identity()) {
                    out.push((list.identity(), list.mutation_count()));
                    stack.extend(list.inner.items.borrow().iter().cloned());
                }
            }
            _ => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[cfg(feature = "json")]
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Undefined, Self::Number),
            serde_json::Value::String(s) => Self::Str(s.into()),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
