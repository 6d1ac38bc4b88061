#![forbid(unsafe_code)]

//! Primitive values and the flat state mapping synchronized with the URL.
//!
//! A [`FlatState`] maps field names to `Option<Value>`: `None` means the field
//! is absent and must not appear in the address. Values are never nested.

use std::fmt;

use crate::codec;

/// A primitive that can round-trip through URL query text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Value {
    /// Borrow the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric payload, if this is a number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean payload, if this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// `true` for the empty string, which the projector treats like absence.
    #[must_use]
    pub fn is_empty_str(&self) -> bool {
        matches!(self, Self::Str(s) if s.is_empty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&codec::encode(self))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Num(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Num(f64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Insertion-ordered mapping from field name to an optional primitive.
///
/// Equality ignores order: two states are equal when they hold the same keys
/// with the same values (absent entries included).
#[derive(Debug, Clone, Default)]
pub struct FlatState {
    entries: Vec<(String, Option<Value>)>,
}

impl FlatState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder-style [`set_absent`](Self::set_absent).
    #[must_use]
    pub fn with_absent(mut self, key: impl Into<String>) -> Self {
        self.set_absent(key);
        self
    }

    /// Set `key` to a present value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.insert(key, Some(value.into()));
    }

    /// Record `key` as explicitly absent.
    pub fn set_absent(&mut self, key: impl Into<String>) {
        self.insert(key, None);
    }

    /// Insert or replace an entry. Replacing keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<Value>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove an entry entirely, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Option<Value>> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Present value for `key`. Absent and missing entries both yield `None`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entry(key).flatten()
    }

    /// Raw entry lookup: `None` if the key is missing, `Some(None)` if it is
    /// recorded as absent.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<Option<&Value>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_ref())
    }

    /// Whether `key` has an entry, present or absent.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Number of entries, absent ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl PartialEq for FlatState {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.entry(k) == Some(v.as_ref()))
    }
}

impl<K: Into<String>> FromIterator<(K, Option<Value>)> for FlatState {
    fn from_iter<I: IntoIterator<Item = (K, Option<Value>)>>(iter: I) -> Self {
        let mut state = Self::new();
        for (key, value) in iter {
            state.insert(key, value);
        }
        state
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for FlatState {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        iter.into_iter().map(|(k, v)| (k, Some(v))).collect()
    }
}
