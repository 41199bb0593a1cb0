// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Argument values accepted by memoized functions.
//!
//! [`Argument`] is a closed sum type. Every value a memoized function can be
//! called with is one of its variants, so the canonicalizer handles each case
//! with an exhaustive `match`.
//!
//! Two variants exist only to model values arriving from dynamic sources
//! (bindings, deserialized payloads, plugin boundaries) that cannot be
//! memoized: [`Argument::Function`] is always rejected, and
//! [`Argument::Object`] is rejected unless it carries its own JSON conversion.
//!
//! # Examples
//!
//! ```rust
//! use async_memo::{Argument, Record, Symbol};
//!
//! let args = vec![
//!     Argument::from("hello"),
//!     Argument::from(42),
//!     Argument::Undefined,
//!     Argument::from(Record::new().with("a", 1).with("b", vec![2, 3])),
//!     Argument::from(Symbol::new("token")),
//! ];
//! assert_eq!(args[3].kind(), "record");
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use num_bigint::BigInt;
use url::Url;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Symbol`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(u64);

impl SymbolId {
    fn next() -> Self {
        Self(NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identity number
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// A value compared by identity rather than content.
///
/// Every call to [`Symbol::new`] produces a distinct identity, even when the
/// descriptions match. Clones share the identity of the original.
///
/// ```rust
/// use async_memo::Symbol;
///
/// let a = Symbol::new("id");
/// let b = Symbol::new("id");
/// assert_ne!(a, b);
/// assert_eq!(a, a.clone());
/// ```
#[derive(Clone)]
pub struct Symbol {
    id: SymbolId,
    description: Option<Arc<str>>,
}

impl Symbol {
    /// Creates a fresh symbol with a description used only for debugging
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: SymbolId::next(),
            description: Some(Arc::from(description.into())),
        }
    }

    /// Creates a fresh symbol without a description
    pub fn anonymous() -> Self {
        Self {
            id: SymbolId::next(),
            description: None,
        }
    }

    pub fn id(&self) -> SymbolId {
        self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "Symbol({description})#{}", self.id.0),
            None => write!(f, "Symbol()#{}", self.id.0),
        }
    }
}

/// A function value received from a dynamic source.
///
/// Functions have no canonical form; canonicalizing one always fails with
/// [`ArgumentError::Function`](crate::ArgumentError::Function).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionRef {
    name: Option<String>,
}

impl FunctionRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// An object instance that is not a plain record.
///
/// Maps, sets, errors and class instances are all foreign objects. An object
/// that provides its own JSON conversion is memoized through that conversion
/// and never inspected further; any other foreign object is rejected with
/// [`ArgumentError::Object`](crate::ArgumentError::Object).
///
/// ```rust
/// use async_memo::ForeignObject;
/// use serde_json::json;
///
/// let map = ForeignObject::opaque("Map");
/// assert!(map.to_json().is_none());
///
/// let money = ForeignObject::with_json("Money", json!({"amount": "1.50", "currency": "EUR"}));
/// assert!(money.to_json().is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignObject {
    type_name: String,
    json: Option<serde_json::Value>,
}

impl ForeignObject {
    /// An object with no JSON conversion
    pub fn opaque(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            json: None,
        }
    }

    /// An object whose JSON conversion yields `json`
    pub fn with_json(type_name: impl Into<String>, json: serde_json::Value) -> Self {
        Self {
            type_name: type_name.into(),
            json: Some(json),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The object's own JSON conversion, if it has one
    pub fn to_json(&self) -> Option<&serde_json::Value> {
        self.json.as_ref()
    }
}

/// A plain record: string keys mapped to arguments.
///
/// Insertion order is preserved so the wrapped function sees keys in the order
/// the caller wrote them, but it never affects equality or the cache key.
///
/// ```rust
/// use async_memo::Record;
///
/// let ab = Record::new().with("a", 1).with("b", 2);
/// let ba = Record::new().with("b", 2).with("a", 1);
/// assert_eq!(ab, ba);
/// assert_eq!(ab.keys().collect::<Vec<_>>(), ["a", "b"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(IndexMap<String, Argument>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Argument>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a value, returning the previous value for the key.
    ///
    /// Replacing an existing key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Argument>) -> Option<Argument> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Argument> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Argument)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<K: Into<String>, V: Into<Argument>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// A single argument of a memoized call.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    String(String),
    /// Double-precision number. Integral values and their float spellings are
    /// the same argument (`1` and `1.0`, `0.0` and `-0.0`).
    Number(f64),
    Boolean(bool),
    Null,
    /// Explicitly passed "no value". Distinct from `Null` and from a
    /// missing trailing argument.
    Undefined,
    /// Arbitrary-precision integer
    BigInt(BigInt),
    Symbol(Symbol),
    /// A point in time, compared by instant
    Instant(DateTime<Utc>),
    /// A URL, compared by its normalized serialization
    Url(Url),
    List(Vec<Argument>),
    Record(Record),
    /// Never memoizable
    Function(FunctionRef),
    /// Memoizable only through its JSON conversion
    Object(ForeignObject),
}

impl Argument {
    /// Short name of the variant, used in logs and error reports
    pub fn kind(&self) -> &'static str {
        match self {
            Argument::String(_) => "string",
            Argument::Number(_) => "number",
            Argument::Boolean(_) => "boolean",
            Argument::Null => "null",
            Argument::Undefined => "undefined",
            Argument::BigInt(_) => "bigint",
            Argument::Symbol(_) => "symbol",
            Argument::Instant(_) => "instant",
            Argument::Url(_) => "url",
            Argument::List(_) => "list",
            Argument::Record(_) => "record",
            Argument::Function(_) => "function",
            Argument::Object(_) => "object",
        }
    }

    /// Builds a list argument from any iterator of convertible values
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Argument>,
    {
        Argument::List(items.into_iter().map(Into::into).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Argument::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Argument::Null | Argument::Undefined)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::String(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::String(value)
    }
}

impl From<bool> for Argument {
    fn from(value: bool) -> Self {
        Argument::Boolean(value)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Argument {
                fn from(value: $ty) -> Self {
                    Argument::Number(f64::from(value))
                }
            }
        )*
    };
}

number_from!(i8, i16, i32, u8, u16, u32, f32, f64);

impl From<BigInt> for Argument {
    fn from(value: BigInt) -> Self {
        Argument::BigInt(value)
    }
}

impl From<Symbol> for Argument {
    fn from(value: Symbol) -> Self {
        Argument::Symbol(value)
    }
}

impl From<DateTime<Utc>> for Argument {
    fn from(value: DateTime<Utc>) -> Self {
        Argument::Instant(value)
    }
}

impl From<Url> for Argument {
    fn from(value: Url) -> Self {
        Argument::Url(value)
    }
}

impl From<Record> for Argument {
    fn from(value: Record) -> Self {
        Argument::Record(value)
    }
}

impl From<FunctionRef> for Argument {
    fn from(value: FunctionRef) -> Self {
        Argument::Function(value)
    }
}

impl From<ForeignObject> for Argument {
    fn from(value: ForeignObject) -> Self {
        Argument::Object(value)
    }
}

impl<T: Into<Argument>> From<Vec<T>> for Argument {
    fn from(value: Vec<T>) -> Self {
        Argument::list(value)
    }
}

/// `None` becomes [`Argument::Null`]
impl<T: Into<Argument>> From<Option<T>> for Argument {
    fn from(value: Option<T>) -> Self {
        value.map_or(Argument::Null, Into::into)
    }
}
