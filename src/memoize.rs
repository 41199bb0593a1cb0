// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Memoization of async functions.
//!
//! [`wrap`] turns an async function of an argument list into a [`Memoized`]
//! one. The future is cached, not the value: calls whose arguments are equal
//! share one invocation while it is pending and after it succeeds. A failed
//! invocation is dropped from the cache so the next equal call retries.
//!
//! # Example
//!
//! ```rust
//! use async_memo::{wrap, Argument};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let calls = Arc::new(AtomicUsize::new(0));
//! let counter = calls.clone();
//! let greet = wrap(move |args: Vec<Argument>| {
//!     let counter = counter.clone();
//!     async move {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!         Ok::<_, String>(format!("hello {}", args[0].as_str().unwrap_or("?")))
//!     }
//! });
//!
//! let first = greet.call(vec![Argument::from("world")]).unwrap();
//! let second = greet.call(vec![Argument::from("world")]).unwrap();
//! assert!(first.ptr_eq(&second));
//!
//! assert_eq!(first.await.unwrap(), "hello world");
//! assert_eq!(second.await.unwrap(), "hello world");
//! assert_eq!(calls.load(Ordering::SeqCst), 1);
//! # });
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, Instrument};

use crate::argument::Argument;
use crate::cache::{CacheStats, FlightCache, Lookup, MemoFuture};
use crate::canonical::{CacheKey, Canonicalizer, Seed};
use crate::config::MemoizeConfig;
use crate::errors::ArgumentError;
use crate::spans;

/// Wraps `function` with default configuration.
///
/// Equivalent to [`Memoized::new`].
pub fn wrap<F, Fut, T, E>(function: F) -> Memoized<F, T, E>
where
    F: Fn(Vec<Argument>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    Memoized::new(function)
}

/// A memoized async function.
///
/// Owns its cache, its seed and its symbol registry. Nothing is shared
/// between two `Memoized` values, even when they wrap the same function.
///
/// Results and errors are handed to every caller sharing an invocation, so
/// both must be `Clone`; wrap non-cloneable errors in an `Arc`.
pub struct Memoized<F, T, E> {
    function: F,
    canonicalizer: Canonicalizer,
    cache: FlightCache<T, E>,
    name: Arc<str>,
}

impl<F, Fut, T, E> Memoized<F, T, E>
where
    F: Fn(Vec<Argument>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Wraps `function` with a random seed and the default name
    pub fn new(function: F) -> Self {
        Self::with_config(function, MemoizeConfig::default())
    }

    pub fn with_config(function: F, config: MemoizeConfig) -> Self {
        Self {
            function,
            canonicalizer: Canonicalizer::with_seed(config.make_seed()),
            cache: FlightCache::default(),
            name: config.name,
        }
    }

    /// Calls the memoized function.
    ///
    /// Returns the shared handle for `args`: the cached one if an equal call
    /// is pending or has succeeded, otherwise a new one. On a miss the wrapped
    /// function is invoked before `call` returns and its future is spawned
    /// onto the current Tokio runtime, so it runs to completion even if every
    /// caller drops its handle.
    ///
    /// # Errors
    ///
    /// Returns an [`ArgumentError`] if `args` contains a function or an
    /// object without a canonical form. The wrapped function is not invoked
    /// and the cache is left untouched. Failures of the wrapped function are
    /// not reported here; they are the output of the returned future.
    ///
    /// # Panics
    ///
    /// Panics if a miss happens outside a Tokio runtime, or if the wrapped
    /// function panics while building its future. A panic inside the future
    /// evicts the entry and is re-raised in every caller awaiting the handle.
    pub fn call(&self, args: Vec<Argument>) -> Result<MemoFuture<T, E>, ArgumentError> {
        let span = spans::call(&self.name, args.len());
        let _guard = span.enter();

        let key = self.canonicalizer.key(&args).inspect_err(|err| {
            debug!(error = %err, path = %err.path(), "Arguments cannot be memoized");
        })?;

        let function = &self.function;
        let name = &self.name;
        let (future, lookup) = self.cache.get_or_start(key, move |key| {
            let span = spans::invoke(name, key);
            let invocation = span.in_scope(|| function(args));
            invocation.instrument(span)
        });

        if lookup == Lookup::Miss {
            debug!("Started new invocation");
        }
        Ok(future)
    }

    /// Canonical key `args` would be cached under
    ///
    /// Symbols seen for the first time are registered, exactly as a call
    /// would register them.
    pub fn key_for(&self, args: &[Argument]) -> Result<CacheKey, ArgumentError> {
        self.canonicalizer.key(args)
    }

    /// Whether a call with `args` would reuse a cached handle
    pub fn contains(&self, args: &[Argument]) -> Result<bool, ArgumentError> {
        let key = self.canonicalizer.key(args)?;
        Ok(self.cache.contains_key(&key))
    }
}

impl<F, T, E> Memoized<F, T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Number of cached handles, pending or fulfilled
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn seed(&self) -> &Seed {
        self.canonicalizer.seed()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<F, T, E> fmt::Debug for Memoized<F, T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("name", &self.name)
            .field("stats", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::{ForeignObject, FunctionRef, Record, Symbol};
    use crate::config::MemoizeConfigBuilder;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Wraps a function that counts its invocations and echoes its arguments
    fn counting() -> (
        Arc<AtomicUsize>,
        Memoized<
            impl Fn(Vec<Argument>) -> futures::future::BoxFuture<'static, Result<usize, String>>,
            usize,
            String,
        >,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let memoized = wrap(move |args: Vec<Argument>| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(args.len())
            }
            .boxed()
        });
        (calls, memoized)
    }

    #[tokio::test]
    async fn test_returns_underlying_value() {
        let (_, memoized) = counting();
        assert_eq!(memoized.call(Vec::new()).unwrap().await, Ok(0));
        assert_eq!(
            memoized.call(vec![Argument::from(456)]).unwrap().await,
            Ok(1)
        );
    }

    #[tokio::test]
    async fn test_concurrent_equal_calls_share_one_invocation() {
        let (calls, memoized) = counting();
        let args = || vec![Argument::from("hello"), Argument::from("world")];

        let first = memoized.call(args()).unwrap();
        let second = memoized.call(args()).unwrap();
        let third = memoized.call(args()).unwrap();
        assert!(first.ptr_eq(&second));
        assert!(second.ptr_eq(&third));

        let results = futures::future::join_all([first, second, third]).await;
        assert_eq!(results, vec![Ok(2), Ok(2), Ok(2)]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_arguments_invoke_separately() {
        let (calls, memoized) = counting();
        let handles: Vec<_> = (1..=3)
            .map(|n| memoized.call(vec![Argument::from("hello"), Argument::from(n)]).unwrap())
            .collect();

        assert!(!handles[0].ptr_eq(&handles[1]));
        assert!(!handles[1].ptr_eq(&handles[2]));
        futures::future::join_all(handles).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_validation_error_leaves_cache_untouched() {
        let (calls, memoized) = counting();

        let err = memoized
            .call(vec![Argument::Function(FunctionRef::anonymous())])
            .unwrap_err();
        assert_eq!(err.to_string(), "Function arguments cannot be memoized");

        for type_name in ["WeakMap", "Map", "WeakSet", "Set", "Error"] {
            let err = memoized
                .call(vec![Argument::Object(ForeignObject::opaque(type_name))])
                .unwrap_err();
            assert_eq!(err.to_string(), "Object argument cannot be memoized");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(memoized.is_empty());
        assert_eq!(memoized.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_empty_record_and_empty_list_are_memoized() {
        let (calls, memoized) = counting();

        memoized.call(vec![Record::new().into()]).unwrap().await.unwrap();
        memoized.call(vec![Record::new().into()]).unwrap().await.unwrap();
        memoized.call(vec![Argument::List(Vec::new())]).unwrap().await.unwrap();
        memoized.call(vec![Argument::list(Vec::<i32>::new())]).unwrap().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_symbol_identity() {
        let (calls, memoized) = counting();
        let s1 = Symbol::new("hello");
        let s2 = Symbol::new("world");

        let p1 = memoized.call(vec![s1.clone().into(), s2.clone().into()]).unwrap();
        let p2 = memoized.call(vec![Argument::Null, Argument::Null]).unwrap();
        let p3 = memoized.call(vec![s1.clone().into(), s2.into()]).unwrap();
        let p4 = memoized.call(vec![s1.clone().into(), s1.into()]).unwrap();

        assert!(!p1.ptr_eq(&p2));
        assert!(p1.ptr_eq(&p3));
        assert!(!p3.ptr_eq(&p4));
        futures::future::join_all([p1, p2, p3, p4]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_contains_and_key_for() {
        let (_, memoized) = counting();
        let args = vec![Argument::from(1)];

        assert!(!memoized.contains(&args).unwrap());
        let future = memoized.call(args.clone()).unwrap();
        assert!(memoized.contains(&args).unwrap());
        assert_eq!(memoized.key_for(&args).unwrap().as_str(), "[1]");
        assert_eq!(future.await, Ok(1));
        assert_eq!(memoized.len(), 1);
    }

    #[tokio::test]
    async fn test_stats_count_hits_and_misses() {
        let (_, memoized) = counting();
        for _ in 0..3 {
            memoized.call(vec![Argument::from("a")]).unwrap().await.unwrap();
        }
        memoized.call(vec![Argument::from("b")]).unwrap().await.unwrap();

        let stats = memoized.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_config_applies_name_and_seed() {
        let config = MemoizeConfigBuilder::new()
            .name("lookup")
            .seed(Seed::new("FIXED"))
            .build();
        let memoized = Memoized::with_config(
            |_: Vec<Argument>| async { Ok::<_, String>(()) },
            config,
        );

        assert_eq!(memoized.name(), "lookup");
        assert_eq!(memoized.seed().as_str(), "FIXED");
        assert_eq!(
            memoized.key_for(&[Argument::Undefined]).unwrap().as_str(),
            r#"["FIXED:undefined'"]"#
        );
        assert!(format!("{memoized:?}").contains("lookup"));
    }

    #[tokio::test]
    async fn test_wrappers_are_independent() {
        let (first_calls, first) = counting();
        let (second_calls, second) = counting();

        first.call(vec![Argument::from(1)]).unwrap().await.unwrap();
        second.call(vec![Argument::from(1)]).unwrap().await.unwrap();

        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_ne!(first.seed(), second.seed());
    }

    #[tokio::test]
    async fn test_invoked_on_miss_without_awaiting() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let memoized = wrap(move |_: Vec<Argument>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(()) }
        });

        drop(memoized.call(vec![Argument::from(1)]).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(memoized.stats().pending, 0);
        assert!(memoized.contains(&[Argument::from(1)]).unwrap());
    }

    #[tokio::test]
    async fn test_timed_out_caller_does_not_stop_invocation() {
        let completions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completions);
        let memoized = wrap(move |_: Vec<Argument>| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            }
        });

        let handle = memoized.call(vec![Argument::from(1)]).unwrap();
        let waited = tokio::time::timeout(Duration::from_millis(5), handle).await;
        assert!(waited.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(memoized.stats().pending, 0);
        assert_eq!(memoized.call(vec![Argument::from(1)]).unwrap().await, Ok(()));
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timed_out_failure_is_still_evicted() {
        let memoized = wrap(|_: Vec<Argument>| async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Err::<(), _>("slow failure".to_string())
        });

        let handle = memoized.call(vec![Argument::from(1)]).unwrap();
        assert!(tokio::time::timeout(Duration::from_millis(5), handle).await.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(memoized.is_empty());
        assert_eq!(memoized.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_panicking_invocation_can_be_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let memoized = wrap(move |_: Vec<Argument>| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    panic!("first attempt exploded");
                }
                Ok::<_, String>(attempt)
            }
        });

        let first = memoized.call(vec![Argument::from("x")]).unwrap();
        let joined = tokio::spawn(first).await;
        assert!(joined.unwrap_err().is_panic());
        assert!(memoized.is_empty());

        let second = memoized.call(vec![Argument::from("x")]).unwrap();
        assert_eq!(second.await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
