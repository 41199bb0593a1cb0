// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Test helpers for async-memo integration tests
//!
//! Provides invocation counters, wrapped functions with scripted outcomes and
//! renderers that show which argument list a wrapped function actually saw.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_memo::Argument;
use futures::future::BoxFuture;
use futures::FutureExt;

/// Shared invocation counter
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments and returns the value before the increment
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub type WrappedFn<T> = Box<dyn Fn(Vec<Argument>) -> BoxFuture<'static, Result<T, String>> + Send + Sync>;

/// A function that counts invocations and renders its arguments
pub fn rendering(counter: &Counter) -> WrappedFn<String> {
    let counter = counter.clone();
    Box::new(move |args| {
        let counter = counter.clone();
        async move {
            counter.bump();
            Ok(render(&args))
        }
        .boxed()
    })
}

/// A function that counts invocations and joins its arguments with commas
pub fn joining(counter: &Counter) -> WrappedFn<String> {
    let counter = counter.clone();
    Box::new(move |args| {
        let counter = counter.clone();
        async move {
            counter.bump();
            Ok(join(&args))
        }
        .boxed()
    })
}

/// A function that sleeps for `delay`, then fails for its first `failures`
/// invocations and succeeds afterwards.
///
/// Failure messages are `"{first} {second} {attempt}"`, built from the first
/// two string arguments.
pub fn flaky(counter: &Counter, failures: usize, delay: Duration) -> WrappedFn<String> {
    let counter = counter.clone();
    Box::new(move |args| {
        let counter = counter.clone();
        async move {
            tokio::time::sleep(delay).await;
            let attempt = counter.bump();
            if attempt >= failures {
                return Ok("success".to_string());
            }
            let words: Vec<&str> = args.iter().filter_map(Argument::as_str).collect();
            Err(format!("{} {attempt}", words.join(" ")))
        }
        .boxed()
    })
}

/// A function that always fails with its string arguments joined by spaces
pub fn failing(counter: &Counter) -> WrappedFn<String> {
    let counter = counter.clone();
    Box::new(move |args| {
        let counter = counter.clone();
        async move {
            counter.bump();
            let words: Vec<&str> = args.iter().filter_map(Argument::as_str).collect();
            Err(words.join(" "))
        }
        .boxed()
    })
}

/// Renders arguments as compact JSON, keeping record insertion order.
///
/// `Undefined` and symbols render as `null`, big integers as `"{n}n"`.
pub fn render(args: &[Argument]) -> String {
    let items: Vec<String> = args.iter().map(render_one).collect();
    format!("[{}]", items.join(","))
}

fn render_one(argument: &Argument) -> String {
    match argument {
        Argument::String(s) => serde_json::Value::from(s.as_str()).to_string(),
        Argument::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
        Argument::Number(n) => n.to_string(),
        Argument::Boolean(b) => b.to_string(),
        Argument::Null | Argument::Undefined | Argument::Symbol(_) => "null".to_string(),
        Argument::BigInt(n) => format!("\"{n}n\""),
        Argument::Instant(instant) => format!("\"{}\"", instant.to_rfc3339()),
        Argument::Url(url) => format!("\"{url}\""),
        Argument::List(items) => render(items),
        Argument::Record(record) => {
            let entries: Vec<String> = record
                .iter()
                .map(|(key, value)| {
                    format!("{}:{}", serde_json::Value::from(key), render_one(value))
                })
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        Argument::Function(_) | Argument::Object(_) => "null".to_string(),
    }
}

/// Joins arguments the way a dynamic language joins an array with commas:
/// records become `[object Object]`, nullish values become empty.
pub fn join(args: &[Argument]) -> String {
    args.iter().map(join_one).collect::<Vec<_>>().join(",")
}

fn join_one(argument: &Argument) -> String {
    match argument {
        Argument::Null | Argument::Undefined => String::new(),
        Argument::String(s) => s.clone(),
        Argument::List(items) => join(items),
        Argument::Record(_) => "[object Object]".to_string(),
        other => render_one(other).trim_matches('"').to_string(),
    }
}

/// Installs a test subscriber once; `RUST_LOG=async_memo=debug` shows cache traffic
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
