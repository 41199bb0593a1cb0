// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Span creation helpers for memoized calls.
//!
//! Telemetry is kept out of the dispatch logic: each instrumented operation
//! has a helper here returning its span.
//!
//! Usage pattern:
//! ```rust,ignore
//! pub fn call(&self, args: Vec<Argument>) -> Result<MemoFuture<T, E>, ArgumentError> {
//!     let span = spans::call(&self.name, args.len());
//!     let _guard = span.enter();
//!     // Business logic here
//! }
//! ```

use tracing::Span;

use crate::canonical::CacheKey;

/// Create span for one call of a memoized function.
///
/// Covers canonicalization and the cache lookup, both synchronous.
///
/// Parent: caller's span
/// Children: none (the invocation runs under its own span)
#[inline]
pub(crate) fn call(name: &str, arg_count: usize) -> Span {
    tracing::debug_span!("async_memo.call", memoized = name, arg_count = arg_count)
}

/// Create span for one real invocation of the wrapped function.
///
/// Entered while the wrapped function builds its future and each time the
/// spawned driver polls it.
///
/// Parent: None (root span for this operation)
/// Children: spans created by the wrapped function
#[inline]
pub(crate) fn invoke(name: &str, key: &CacheKey) -> Span {
    tracing::info_span!(parent: None, "async_memo.invoke", memoized = name, key = %key)
}
