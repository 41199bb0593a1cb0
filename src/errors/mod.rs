// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the async-memo library.
//!
//! Memoized calls report failures through two disjoint channels:
//!
//! - **Synchronous validation errors** ([`ArgumentError`]) are returned by
//!   [`Memoized::call`](crate::Memoized::call) before the wrapped function runs.
//!   They mean the argument list contains a value that has no canonical form.
//! - **Asynchronous failures** are the wrapped function's own `Err` values. They
//!   are delivered unchanged through the returned [`MemoFuture`](crate::MemoFuture)
//!   and are never wrapped by this crate.
//!
//! # Examples
//!
//! ```rust
//! use async_memo::{wrap, Argument, ArgumentError, ForeignObject};
//!
//! let memoized = wrap(|args: Vec<Argument>| async move { Ok::<_, String>(args.len()) });
//!
//! match memoized.call(vec![Argument::Object(ForeignObject::opaque("Map"))]) {
//!     Ok(_) => unreachable!("opaque objects have no canonical form"),
//!     Err(ArgumentError::Object { type_name, .. }) => assert_eq!(type_name, "Map"),
//!     Err(e) => panic!("unexpected error: {e}"),
//! }
//! ```

mod argument;

pub use argument::{ArgumentError, ArgumentPath, PathSegment};
