// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, error};

use super::CacheStats;
use crate::canonical::CacheKey;

/// The wrapped function panicked instead of returning.
#[derive(Debug, Clone)]
struct Panicked {
    message: Arc<str>,
}

impl Panicked {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "Box<dyn Any>".to_string());
        Self {
            message: message.into(),
        }
    }
}

type Outcome<T, E> = Result<Result<T, E>, Panicked>;

/// Shared handle to one invocation of a memoized function.
///
/// Every caller whose arguments canonicalize to the same key while the
/// invocation is pending or fulfilled receives a clone of the same handle,
/// and [`MemoFuture::ptr_eq`] tells whether two handles are the same one.
/// Awaiting any clone yields a clone of the invocation's result.
///
/// The invocation is driven on the Tokio runtime independently of its
/// handles: dropping every handle, or abandoning one mid-await, neither
/// cancels nor stalls it.
///
/// # Panics
///
/// Awaiting a handle whose invocation panicked panics with the same message.
#[must_use = "the invocation runs anyway; the handle is the only way to observe its result"]
pub struct MemoFuture<T, E> {
    inner: Shared<BoxFuture<'static, Outcome<T, E>>>,
    identity: Arc<()>,
}

impl<T, E> MemoFuture<T, E>
where
    T: Clone,
    E: Clone,
{
    fn new(inner: BoxFuture<'static, Outcome<T, E>>) -> Self {
        Self {
            inner: inner.shared(),
            identity: Arc::new(()),
        }
    }

    /// Returns `true` if both handles refer to the same invocation
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.identity, &other.identity)
    }

    /// The result, if the invocation has returned
    pub fn peek(&self) -> Option<&Result<T, E>> {
        self.inner.peek().and_then(|outcome| outcome.as_ref().ok())
    }

    /// Whether the invocation has finished, by returning or by panicking
    pub fn is_settled(&self) -> bool {
        self.inner.peek().is_some()
    }
}

impl<T, E> Clone for MemoFuture<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            identity: Arc::clone(&self.identity),
        }
    }
}

impl<T, E> fmt::Debug for MemoFuture<T, E>
where
    T: Clone,
    E: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoFuture")
            .field("settled", &self.is_settled())
            .finish_non_exhaustive()
    }
}

impl<T, E> Future for MemoFuture<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut().inner.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(panicked)) => panic!("memoized function panicked: {}", panicked.message),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct Entry<T, E> {
    generation: u64,
    future: MemoFuture<T, E>,
}

struct FlightState<T, E> {
    entries: HashMap<CacheKey, Entry<T, E>>,
    next_generation: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<T, E> Default for FlightState<T, E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_generation: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }
}

/// Whether a lookup reused an entry or created one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    Hit,
    Miss,
}

/// Removes one specific entry once its invocation fails.
///
/// Holds only a weak link to the cache: an invocation outliving its wrapper
/// has nothing to evict.
#[derive(Clone)]
pub(crate) struct Evictor<T, E> {
    state: Weak<Mutex<FlightState<T, E>>>,
    key: CacheKey,
    generation: u64,
}

impl<T, E> Evictor<T, E> {
    /// Evicts the entry this evictor was created for.
    ///
    /// Returns `false` if the cache is gone or the key now holds a different
    /// entry.
    pub(crate) fn evict(&self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };

        let mut state = state.lock();
        let owned = state
            .entries
            .get(&self.key)
            .is_some_and(|entry| entry.generation == self.generation);
        if !owned {
            return false;
        }

        let removed = state.entries.remove(&self.key);
        state.evictions += 1;
        drop(state);
        drop(removed);

        debug!(key = %self.key, generation = self.generation, "Evicted failed invocation");
        true
    }
}

/// Runs one invocation once `start` has handed it over.
///
/// Failures and panics evict the entry before the outcome becomes visible
/// to any awaiter.
async fn drive<T, E>(
    invocation: oneshot::Receiver<BoxFuture<'static, Result<T, E>>>,
    evictor: Evictor<T, E>,
) -> Outcome<T, E> {
    let Ok(invocation) = invocation.await else {
        // `start` panicked; the caller already evicted the entry
        return Err(Panicked {
            message: "memoized function panicked before returning a future".into(),
        });
    };

    match AssertUnwindSafe(invocation).catch_unwind().await {
        Ok(result) => {
            if result.is_err() {
                evictor.evict();
            }
            Ok(result)
        }
        Err(payload) => {
            evictor.evict();
            let panicked = Panicked::from_payload(payload.as_ref());
            error!(key = %evictor.key, message = %panicked.message, "Memoized function panicked");
            Err(panicked)
        }
    }
}

/// Map from canonical key to shared invocation handle.
pub(crate) struct FlightCache<T, E> {
    state: Arc<Mutex<FlightState<T, E>>>,
}

impl<T, E> Default for FlightCache<T, E> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(FlightState::default())),
        }
    }
}

impl<T, E> FlightCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Returns the handle cached under `key`, or stores a new one and starts
    /// its invocation.
    ///
    /// The lookup and the insert happen under one lock acquisition, so
    /// concurrent callers with equal keys share a single entry. On a miss,
    /// `start` is called once the lock is released and the future it returns
    /// is spawned onto the current Tokio runtime, which runs it to completion
    /// whatever happens to the returned handles.
    ///
    /// # Panics
    ///
    /// Panics on a miss outside a Tokio runtime, or if `start` panics. Either
    /// way the new entry is evicted first.
    pub(crate) fn get_or_start<S, Fut>(&self, key: CacheKey, start: S) -> (MemoFuture<T, E>, Lookup)
    where
        S: FnOnce(&CacheKey) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (future, evictor, slot) = {
            let mut state = self.state.lock();

            if let Some(future) = state.entries.get(&key).map(|entry| entry.future.clone()) {
                state.hits += 1;
                debug!(key = %key, settled = future.is_settled(), "Cache hit");
                return (future, Lookup::Hit);
            }

            let generation = state.next_generation;
            state.next_generation += 1;

            let evictor = Evictor {
                state: Arc::downgrade(&self.state),
                key: key.clone(),
                generation,
            };
            let (slot, invocation) = oneshot::channel();
            let future = MemoFuture::new(drive(invocation, evictor.clone()).boxed());

            debug!(key = %key, generation, "Cache miss");
            state.entries.insert(
                key,
                Entry {
                    generation,
                    future: future.clone(),
                },
            );
            state.misses += 1;
            (future, evictor, slot)
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                evictor.evict();
                panic!("memoized functions must be called within a Tokio runtime: {err}");
            }
        };

        let started = panic::catch_unwind(AssertUnwindSafe(|| start(&evictor.key).boxed()));
        let invocation = match started {
            Ok(invocation) => invocation,
            Err(payload) => {
                evictor.evict();
                panic::resume_unwind(payload);
            }
        };
        // The receiver lives inside `future`, which is still held here.
        let _ = slot.send(invocation);

        runtime.spawn(future.inner.clone());

        (future, Lookup::Miss)
    }

    pub(crate) fn contains_key(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub(crate) fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            entries: state.entries.len(),
            pending: state
                .entries
                .values()
                .filter(|entry| !entry.future.is_settled())
                .count(),
        }
    }
}
