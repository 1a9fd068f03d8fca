//! Keyed fetch cache with in-flight de-duplication.
//!
//! # Design
//! Every key owns an `Entry` with two locks:
//!
//! - `gate`, an async mutex held for the whole duration of a fetch. A second
//!   `load` of the same key waits on it and then finds the first caller's
//!   settled result, so at most one request per key is ever in flight.
//! - `slot`, a short-lived sync mutex around the observable state. `peek`
//!   and `invalidate` only touch the slot and never wait for a fetch.
//!
//! Freshness is tracked with a generation counter. `invalidate` bumps the
//! generation; a settled state is served from cache only while it was
//! settled at the current generation. A fetch that completes after its key
//! was invalidated still records its value as the latest known one, but the
//! next `load` refetches.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::ApiError;

/// Observable state of one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<V> {
    /// A fetch is in flight. `stale` is the last successful value, if any.
    Pending { stale: Option<V> },
    Success(V),
    Failure(ApiError),
}

impl<V> FetchState<V> {
    /// The most recent value this entry has seen, fresh or stale.
    pub fn value(&self) -> Option<&V> {
        match self {
            FetchState::Pending { stale } => stale.as_ref(),
            FetchState::Success(value) => Some(value),
            FetchState::Failure(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FetchState::Pending { .. })
    }
}

#[derive(Debug)]
struct Slot<V> {
    state: FetchState<V>,
    generation: u64,
    settled_at: Option<u64>,
}

impl<V: Clone> Slot<V> {
    fn new() -> Self {
        Self {
            state: FetchState::Pending { stale: None },
            generation: 0,
            settled_at: None,
        }
    }

    fn is_fresh(&self) -> bool {
        self.settled_at == Some(self.generation)
    }

    fn settled(&self) -> Option<Result<V, ApiError>> {
        if !self.is_fresh() {
            return None;
        }
        match &self.state {
            FetchState::Success(value) => Some(Ok(value.clone())),
            FetchState::Failure(err) => Some(Err(err.clone())),
            FetchState::Pending { .. } => None,
        }
    }

    fn begin(&mut self) -> u64 {
        let stale = self.state.value().cloned();
        self.state = FetchState::Pending { stale };
        self.generation
    }

    fn settle(&mut self, generation: u64, result: &Result<V, ApiError>) {
        self.state = match result {
            Ok(value) => FetchState::Success(value.clone()),
            Err(err) => FetchState::Failure(err.clone()),
        };
        if generation == self.generation {
            self.settled_at = Some(generation);
        }
    }
}

#[derive(Debug)]
struct Entry<V> {
    gate: tokio::sync::Mutex<()>,
    slot: Mutex<Slot<V>>,
}

impl<V: Clone> Entry<V> {
    fn new() -> Self {
        Self {
            gate: tokio::sync::Mutex::new(()),
            slot: Mutex::new(Slot::new()),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot<V>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fetch cache for one entity type, keyed by `K`.
#[derive(Debug)]
pub struct QueryCache<K, V> {
    entries: Mutex<HashMap<K, Arc<Entry<V>>>>,
}

impl<K, V> Default for QueryCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the fresh value for `key`, or run `fetch` to obtain one.
    ///
    /// Concurrent callers for the same key share a single `fetch`: whoever
    /// arrives while a fetch is in flight waits and receives its result. A
    /// settled failure is also served from cache until `invalidate`.
    pub async fn load<F, Fut>(&self, key: &K, fetch: F) -> Result<V, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>>,
    {
        let entry = self.entry(key);
        let _gate = entry.gate.lock().await;

        let generation = {
            let mut slot = entry.slot();
            if let Some(settled) = slot.settled() {
                debug!(key = ?key, "cache hit");
                return settled;
            }
            slot.begin()
        };

        debug!(key = ?key, generation, "fetching");
        let result = fetch().await;
        entry.slot().settle(generation, &result);
        result
    }

    /// Current state of `key` without triggering a fetch.
    pub fn peek(&self, key: &K) -> Option<FetchState<V>> {
        let entry = self.lookup(key)?;
        let state = entry.slot().state.clone();
        Some(state)
    }

    /// Whether the next `load` of `key` would be served from cache.
    pub fn is_fresh(&self, key: &K) -> bool {
        self.lookup(key).is_some_and(|entry| entry.slot().is_fresh())
    }

    /// Force the next `load` of `key` to refetch. Returns whether the key
    /// was known to the cache.
    pub fn invalidate(&self, key: &K) -> bool {
        match self.lookup(key) {
            Some(entry) => {
                entry.slot().generation += 1;
                debug!(key = ?key, "invalidated");
                true
            }
            None => false,
        }
    }

    /// Invalidate every key matching `predicate`; returns how many matched.
    pub fn invalidate_where(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let matched: Vec<K> = self
            .entries()
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();
        for key in &matched {
            self.invalidate(key);
        }
        matched.len()
    }

    pub fn invalidate_all(&self) -> usize {
        self.invalidate_where(|_| true)
    }

    /// Drop every entry. In-flight fetches finish but their results are
    /// recorded on entries the cache no longer holds.
    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Replace the last known value of `key` with `patch(value)` and return
    /// the previous state for `restore`. Returns `None` when there is no
    /// value to patch. Freshness is unchanged.
    pub fn patch(&self, key: &K, patch: impl FnOnce(&V) -> V) -> Option<FetchState<V>> {
        let entry = self.lookup(key)?;
        let mut slot = entry.slot();
        let patched = patch(slot.state.value()?);
        let previous = slot.state.clone();
        let next = match &previous {
            FetchState::Pending { .. } => FetchState::Pending {
                stale: Some(patched),
            },
            _ => FetchState::Success(patched),
        };
        slot.state = next;
        Some(previous)
    }

    /// Put back a state captured by `patch`.
    pub fn restore(&self, key: &K, previous: FetchState<V>) {
        if let Some(entry) = self.lookup(key) {
            entry.slot().state = previous;
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<K, Arc<Entry<V>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: &K) -> Option<Arc<Entry<V>>> {
        self.entries().get(key).cloned()
    }

    fn entry(&self, key: &K) -> Arc<Entry<V>> {
        self.entries()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Entry::new()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted(
        calls: &AtomicUsize,
        value: u32,
    ) -> impl Future<Output = Result<u32, ApiError>> + '_ {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(value)
        }
    }

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let cache = QueryCache::<&str, u32>::new();
        let calls = AtomicUsize::new(0);

        assert_eq!(cache.load(&"k", || counted(&calls, 1)).await, Ok(1));
        assert_eq!(cache.load(&"k", || counted(&calls, 2)).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_fresh(&"k"));
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let cache = QueryCache::<&str, u32>::new();
        let calls = AtomicUsize::new(0);

        let (a, b) = tokio::join!(
            cache.load(&"k", || counted(&calls, 7)),
            cache.load(&"k", || counted(&calls, 8)),
        );
        assert_eq!(a, Ok(7));
        assert_eq!(b, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_fetch_independently() {
        let cache = QueryCache::<&str, u32>::new();
        let calls = AtomicUsize::new(0);

        let (a, b) = tokio::join!(
            cache.load(&"a", || counted(&calls, 1)),
            cache.load(&"b", || counted(&calls, 2)),
        );
        assert_eq!((a, b), (Ok(1), Ok(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = QueryCache::<&str, u32>::new();
        let calls = AtomicUsize::new(0);

        cache.load(&"k", || counted(&calls, 1)).await.unwrap();
        assert!(cache.invalidate(&"k"));
        assert!(!cache.is_fresh(&"k"));
        assert_eq!(cache.peek(&"k"), Some(FetchState::Success(1)));

        assert_eq!(cache.load(&"k", || counted(&calls, 2)).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidating_unknown_key_is_a_no_op() {
        let cache = QueryCache::<&str, u32>::new();
        assert!(!cache.invalidate(&"missing"));
        assert!(cache.peek(&"missing").is_none());
    }

    #[tokio::test]
    async fn failures_are_cached_until_invalidated() {
        let cache = QueryCache::<&str, u32>::new();
        let calls = AtomicUsize::new(0);

        let first = cache
            .load(&"k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Transport("offline".to_string()))
            })
            .await;
        assert!(first.is_err());

        let second = cache.load(&"k", || counted(&calls, 5)).await;
        assert_eq!(second, Err(ApiError::Transport("offline".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&"k");
        assert_eq!(cache.load(&"k", || counted(&calls, 5)).await, Ok(5));
    }

    #[tokio::test]
    async fn pending_state_exposes_stale_value() {
        let cache = QueryCache::<&str, u32>::new();
        let calls = AtomicUsize::new(0);
        cache.load(&"k", || counted(&calls, 1)).await.unwrap();
        cache.invalidate(&"k");

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let refresh = cache.load(&"k", || async move {
            let _ = rx.await;
            Ok(2)
        });
        let observe = async {
            tokio::task::yield_now().await;
            let state = cache.peek(&"k");
            let _ = tx.send(());
            state
        };
        let (refreshed, observed) = tokio::join!(refresh, observe);

        assert_eq!(observed, Some(FetchState::Pending { stale: Some(1) }));
        assert_eq!(refreshed, Ok(2));
    }

    #[tokio::test]
    async fn invalidate_during_fetch_keeps_entry_stale() {
        let cache = QueryCache::<&str, u32>::new();
        let calls = AtomicUsize::new(0);

        let value = cache
            .load(&"k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                cache.invalidate(&"k");
                Ok(1)
            })
            .await;
        assert_eq!(value, Ok(1));
        assert!(!cache.is_fresh(&"k"));

        assert_eq!(cache.load(&"k", || counted(&calls, 2)).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_where_matches_families() {
        let cache = QueryCache::<(&str, &str), u32>::new();
        let calls = AtomicUsize::new(0);
        cache.load(&("c1", "b1"), || counted(&calls, 1)).await.unwrap();
        cache.load(&("c1", "b2"), || counted(&calls, 2)).await.unwrap();
        cache.load(&("c2", "b1"), || counted(&calls, 3)).await.unwrap();

        assert_eq!(cache.invalidate_where(|(collection, _)| *collection == "c1"), 2);
        assert!(!cache.is_fresh(&("c1", "b1")));
        assert!(cache.is_fresh(&("c2", "b1")));
    }

    #[tokio::test]
    async fn patch_and_restore() {
        let cache = QueryCache::<&str, Vec<u32>>::new();
        cache.load(&"k", || async { Ok(vec![1, 2, 3]) }).await.unwrap();

        let previous = cache
            .patch(&"k", |items| items.iter().copied().filter(|&i| i != 2).collect())
            .unwrap();
        assert_eq!(cache.peek(&"k"), Some(FetchState::Success(vec![1, 3])));
        assert!(cache.is_fresh(&"k"));

        cache.restore(&"k", previous);
        assert_eq!(cache.peek(&"k"), Some(FetchState::Success(vec![1, 2, 3])));
    }

    #[tokio::test]
    async fn patch_without_value_is_none() {
        let cache = QueryCache::<&str, u32>::new();
        assert!(cache.patch(&"k", |v| v + 1).is_none());
    }

    #[tokio::test]
    async fn clear_drops_entries() {
        let cache = QueryCache::<&str, u32>::new();
        cache.load(&"k", || async { Ok(1) }).await.unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
