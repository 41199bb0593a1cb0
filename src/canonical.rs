// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Canonical cache keys for argument lists.
//!
//! A key is produced in two passes over the argument list:
//!
//! 1. **Encode**: walk the arguments depth-first into a `serde_json::Value`
//!    tree. Values JSON cannot tell apart (`undefined`, big integers,
//!    symbols) are replaced by placeholder strings tagged with a per-instance
//!    random [`Seed`], and every record key met anywhere in the tree is
//!    collected into one set.
//! 2. **Write**: serialize the tree to compact JSON text, emitting the entries
//!    of every object in the order of the sorted key set. List positions are
//!    written as they are.
//!
//! Two argument lists therefore share a key when they are equal position by
//! position, with records compared as unordered key/value sets. The converse
//! holds except where JSON itself merges values: instants and URLs encode as
//! their strings, and non-finite numbers encode as `null`.
//!
//! ```rust
//! use async_memo::{Argument, Canonicalizer, Record};
//!
//! let canonicalizer = Canonicalizer::new();
//! let ab = canonicalizer.key(&[Record::new().with("a", 1).with("b", 2).into()]).unwrap();
//! let ba = canonicalizer.key(&[Record::new().with("b", 2).with("a", 1).into()]).unwrap();
//! assert_eq!(ab, ba);
//! assert_eq!(ab.as_str(), r#"[{"a":1,"b":2}]"#);
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use chrono::SecondsFormat;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Number, Value};
use tracing::trace;

use crate::argument::{Argument, Symbol, SymbolId};
use crate::config::constants::{DEFAULT_SEED_LENGTH, MAX_SAFE_INTEGER, SYMBOL_TOKEN_LENGTH};
use crate::errors::{ArgumentError, ArgumentPath, PathSegment};

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random prefix that keeps placeholder encodings apart from user strings.
///
/// A placeholder such as `"{seed}:12n"` can only collide with a caller's
/// string if that string happens to contain the seed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Seed(String);

impl Seed {
    /// Generates a random alphanumeric seed of `len` characters
    pub fn random(len: usize) -> Self {
        Self(random_token(len))
    }

    /// Uses a fixed seed, for reproducible keys
    pub fn new(seed: impl Into<String>) -> Self {
        Self(seed.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Seed {
    fn default() -> Self {
        Self::random(DEFAULT_SEED_LENGTH)
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical key for one argument list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encoded form of every symbol seen by one canonicalizer.
///
/// Entries are created on first sight and never removed, so the same symbol
/// maps to the same placeholder for the lifetime of the owner.
#[derive(Debug, Default)]
struct SymbolRegistry {
    encoded: HashMap<SymbolId, String>,
    issued: HashSet<String>,
}

impl SymbolRegistry {
    fn encode(&mut self, seed: &Seed, symbol: &Symbol) -> String {
        if let Some(encoded) = self.encoded.get(&symbol.id()) {
            return encoded.clone();
        }

        let encoded = loop {
            let candidate = format!("{seed}:symbol:{}", random_token(SYMBOL_TOKEN_LENGTH));
            if self.issued.insert(candidate.clone()) {
                break candidate;
            }
        };

        trace!(
            symbol = ?symbol,
            registered = self.encoded.len() + 1,
            "Registered symbol"
        );
        self.encoded.insert(symbol.id(), encoded.clone());
        encoded
    }

    fn len(&self) -> usize {
        self.encoded.len()
    }
}

/// Maps argument lists to [`CacheKey`]s.
///
/// Each canonicalizer owns its seed and symbol registry; keys from two
/// different canonicalizers are not comparable.
#[derive(Debug)]
pub struct Canonicalizer {
    seed: Seed,
    symbols: Mutex<SymbolRegistry>,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Canonicalizer {
    /// Creates a canonicalizer with a fresh random seed
    pub fn new() -> Self {
        Self::with_seed(Seed::default())
    }

    pub fn with_seed(seed: Seed) -> Self {
        Self {
            seed,
            symbols: Mutex::new(SymbolRegistry::default()),
        }
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    /// Number of distinct symbols encoded so far
    pub fn registered_symbols(&self) -> usize {
        self.symbols.lock().len()
    }

    /// Computes the canonical key for `args`.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::Function`] if a function appears anywhere in
    /// the arguments, and [`ArgumentError::Object`] for foreign objects
    /// without a JSON conversion. Symbols encountered before the failing value
    /// stay registered.
    pub fn key(&self, args: &[Argument]) -> Result<CacheKey, ArgumentError> {
        let mut symbols = self.symbols.lock();
        let mut encoder = Encoder {
            seed: &self.seed,
            symbols: &mut symbols,
            keys: BTreeSet::new(),
            path: Vec::new(),
        };
        let tree = encoder.encode_list(args)?;
        let order = KeyOrder::new(encoder.keys);
        drop(symbols);

        let mut out = String::new();
        write_value(&tree, &order, &mut out);
        Ok(CacheKey(out))
    }
}

/// First pass: argument tree to JSON tree with placeholders.
struct Encoder<'a> {
    seed: &'a Seed,
    symbols: &'a mut SymbolRegistry,
    keys: BTreeSet<String>,
    path: Vec<PathSegment>,
}

impl Encoder<'_> {
    fn current_path(&self) -> ArgumentPath {
        self.path.iter().cloned().collect()
    }

    fn encode_list(&mut self, items: &[Argument]) -> Result<Value, ArgumentError> {
        let mut encoded = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            self.path.push(PathSegment::Index(index));
            encoded.push(self.encode(item)?);
            self.path.pop();
        }
        Ok(Value::Array(encoded))
    }

    fn encode(&mut self, argument: &Argument) -> Result<Value, ArgumentError> {
        let value = match argument {
            Argument::String(s) => Value::String(s.clone()),
            Argument::Number(n) => number_value(*n),
            Argument::Boolean(b) => Value::Bool(*b),
            Argument::Null => Value::Null,
            Argument::Undefined => Value::String(format!("{}:undefined'", self.seed)),
            Argument::BigInt(n) => Value::String(format!("{}:{n}n", self.seed)),
            Argument::Symbol(symbol) => Value::String(self.symbols.encode(self.seed, symbol)),
            Argument::Instant(instant) => {
                Value::String(instant.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Argument::Url(url) => Value::String(url.as_str().to_string()),
            Argument::List(items) => self.encode_list(items)?,
            Argument::Record(record) => {
                let mut map = Map::new();
                for (key, item) in record.iter() {
                    self.keys.insert(key.to_string());
                    self.path.push(PathSegment::Key(key.to_string()));
                    let encoded = self.encode(item)?;
                    self.path.pop();
                    map.insert(key.to_string(), encoded);
                }
                Value::Object(map)
            }
            Argument::Function(_) => return Err(ArgumentError::function(self.current_path())),
            Argument::Object(object) => match object.to_json() {
                Some(json) => {
                    self.collect_json_keys(json);
                    json.clone()
                }
                None => {
                    return Err(ArgumentError::object(
                        self.current_path(),
                        object.type_name(),
                    ))
                }
            },
        };
        Ok(value)
    }

    fn collect_json_keys(&mut self, json: &Value) {
        match json {
            Value::Array(items) => items.iter().for_each(|item| self.collect_json_keys(item)),
            Value::Object(map) => {
                for (key, item) in map {
                    self.keys.insert(key.clone());
                    self.collect_json_keys(item);
                }
            }
            _ => {}
        }
    }
}

/// JSON text rules: integral values print without a fraction, non-finite
/// values print as `null`.
fn number_value(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Value::from(n as i64);
    }
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

/// Sorted union of every record key in one argument list.
struct KeyOrder(Vec<String>);

impl KeyOrder {
    fn new(keys: BTreeSet<String>) -> Self {
        Self(keys.into_iter().collect())
    }

    fn rank(&self, key: &str) -> usize {
        // Keys absent from the set cannot occur; they would sort last.
        self.0
            .binary_search_by(|probe| probe.as_str().cmp(key))
            .unwrap_or(self.0.len())
    }
}

/// Second pass: compact JSON text with object entries in key order.
fn write_value(value: &Value, order: &KeyOrder, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_value(item, order, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by_key(|(key, _)| order.rank(key));
            out.push('{');
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_value(item, order, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
