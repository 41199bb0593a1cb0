// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Memoize async functions by the semantic value of their arguments.
//!
//! [`wrap`] turns `Fn(Vec<Argument>) -> impl Future<Output = Result<T, E>>`
//! into a [`Memoized`] function whose calls with equal arguments share one
//! invocation. Arguments are compared through a canonical key:
//!
//! - records compare as unordered key/value sets at every depth
//! - lists and argument positions compare in order
//! - `Undefined`, `Null` and a missing argument are three different things
//! - big integers never collide with lookalike strings
//! - symbols compare by identity, stably for the lifetime of the wrapper
//! - instants compare by instant, URLs by their normalized form
//!
//! Successful results stay cached for the lifetime of the wrapper. A failed
//! invocation is evicted before its error reaches any caller, so the next
//! equal call runs the function again.
//!
//! Arguments that have no canonical form (functions, opaque objects) are
//! rejected synchronously with an [`ArgumentError`]; the wrapped function is
//! never invoked for them.

mod argument;
mod cache;
mod canonical;
mod config;
mod errors;
mod memoize;
mod spans;

pub use argument::{Argument, ForeignObject, FunctionRef, Record, Symbol, SymbolId};
pub use cache::{CacheStats, MemoFuture};
pub use canonical::{CacheKey, Canonicalizer, Seed};
pub use config::{constants, MemoizeConfig, MemoizeConfigBuilder};
pub use errors::{ArgumentError, ArgumentPath, PathSegment};
pub use memoize::{wrap, Memoized};
