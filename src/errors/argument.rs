// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Validation errors raised while canonicalizing an argument list.

use std::fmt;

/// One step from the argument list root down to a nested value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Position inside the argument list or a nested list.
    Index(usize),
    /// Key inside a record.
    Key(String),
}

/// Location of a value inside an argument list.
///
/// Renders as `$` for the list itself, `$[1]` for the second argument and
/// `$[1].config.hosts[0]` for nested values. Keys that are not plain
/// identifiers are rendered in quoted bracket form: `$[0]["content-type"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentPath(Vec<PathSegment>);

impl ArgumentPath {
    /// Path of the argument list itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Segments from the root, outermost first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Index of the top-level argument this path points into, if any.
    pub fn argument_index(&self) -> Option<usize> {
        match self.0.first() {
            Some(PathSegment::Index(index)) => Some(*index),
            _ => None,
        }
    }
}

impl FromIterator<PathSegment> for ArgumentPath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}

impl fmt::Display for ArgumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Key(key) if is_identifier(key) => write!(f, ".{key}")?,
                PathSegment::Key(key) => write!(f, "[{key:?}]")?,
            }
        }
        Ok(())
    }
}

/// Errors raised when an argument list has no canonical cache key.
///
/// These are returned synchronously, before the wrapped function is invoked
/// and before any cache state changes. The display text of each variant is
/// fixed so callers can match on it.
///
/// # Examples
///
/// ```rust
/// use async_memo::{Argument, ArgumentError, Canonicalizer, FunctionRef};
///
/// let canonicalizer = Canonicalizer::new();
/// let err = canonicalizer
///     .key(&[Argument::from(1), Argument::Function(FunctionRef::named("callback"))])
///     .unwrap_err();
///
/// assert_eq!(err.to_string(), "Function arguments cannot be memoized");
/// assert_eq!(err.path().to_string(), "$[1]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    /// A function value appears somewhere in the argument list.
    ///
    /// Functions are never coerced into a key, not even by name.
    #[error("Function arguments cannot be memoized")]
    Function {
        /// Where the function was found
        path: ArgumentPath,
    },

    /// An object instance that is neither a plain record nor convertible to
    /// JSON appears somewhere in the argument list.
    ///
    /// Collections such as maps and sets, errors and class instances all fall
    /// in this category.
    #[error("Object argument cannot be memoized")]
    Object {
        /// Where the object was found
        path: ArgumentPath,
        /// Runtime type name reported by the object
        type_name: String,
    },
}

impl ArgumentError {
    /// Create a `Function` error at the given location.
    pub fn function(path: ArgumentPath) -> Self {
        ArgumentError::Function { path }
    }

    /// Create an `Object` error at the given location.
    pub fn object(path: ArgumentPath, type_name: impl Into<String>) -> Self {
        ArgumentError::Object {
            path,
            type_name: type_name.into(),
        }
    }

    /// Location of the offending value.
    pub fn path(&self) -> &ArgumentPath {
        match self {
            ArgumentError::Function { path } | ArgumentError::Object { path, .. } => path,
        }
    }
}
