//! Mutate-then-invalidate contract.
//!
//! # Design
//! A `Mutation` names the cache entry that owns the mutated entity (plus any
//! other entries the write makes stale) and runs one write against the
//! backend. Invalidation happens strictly after the write resolves
//! successfully, so the refetch observes committed server state. A failed
//! write leaves every cache entry exactly as it was; there is no retry.
//!
//! Under `MutationPolicy::Optimistic` the owner's cached value is patched
//! before the write is sent and rolled back if the write fails.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use tracing::{info, warn};

use crate::cache::QueryCache;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MutationPolicy {
    /// Touch the cache only after the server confirms the write.
    #[default]
    Pessimistic,
    /// Patch the owner's cached value first; roll back on failure.
    Optimistic,
}

type Followup<'c> = Box<dyn FnOnce() + Send + 'c>;

pub struct Mutation<'c, K, V> {
    label: &'static str,
    cache: &'c QueryCache<K, V>,
    owner: K,
    followups: Vec<Followup<'c>>,
}

impl<'c, K, V> Mutation<'c, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new(label: &'static str, cache: &'c QueryCache<K, V>, owner: K) -> Self {
        Self {
            label,
            cache,
            owner,
            followups: Vec::new(),
        }
    }

    /// Extra invalidation to run after a successful write, typically on a
    /// different cache (a deleted book's own entry, a parent listing).
    pub fn also(mut self, followup: impl FnOnce() + Send + 'c) -> Self {
        self.followups.push(Box::new(followup));
        self
    }

    /// Run `write` pessimistically.
    pub async fn run<T, Fut>(self, write: Fut) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let result = write.await;
        self.finish(result)
    }

    /// Run `write` under `policy`; `patch` is only used when optimistic.
    pub async fn run_with<T, Fut, P>(self, policy: MutationPolicy, patch: P, write: Fut) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
        P: FnOnce(&V) -> V,
    {
        match policy {
            MutationPolicy::Pessimistic => self.run(write).await,
            MutationPolicy::Optimistic => self.run_optimistic(patch, write).await,
        }
    }

    pub async fn run_optimistic<T, Fut, P>(self, patch: P, write: Fut) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
        P: FnOnce(&V) -> V,
    {
        let previous = self.cache.patch(&self.owner, patch);
        let result = write.await;
        if result.is_err() {
            if let Some(previous) = previous {
                self.cache.restore(&self.owner, previous);
            }
        }
        self.finish(result)
    }

    fn finish<T>(self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        match result {
            Ok(value) => {
                self.cache.invalidate(&self.owner);
                for followup in self.followups {
                    followup();
                }
                info!(mutation = self.label, owner = ?self.owner, "mutation committed");
                Ok(value)
            }
            Err(err) => {
                warn!(mutation = self.label, owner = ?self.owner, error = %err, "mutation failed");
                Err(err)
            }
        }
    }
}
