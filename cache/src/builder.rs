use crate::cache::VolatileCache;
use crate::error::BuildError;
use crate::shared::CacheShared;
use crate::store::ShardedStore;
use crate::value::VolatileValue;

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;

/// How many reclamation notices a single finalize pass processes by default.
pub const DEFAULT_FINALIZE_BATCH: usize = 500;

/// A builder for creating `VolatileCache` instances.
pub struct VolatileCacheBuilder<K, V, H = ahash::RandomState> {
  shards: usize,
  finalize_batch: usize,
  pressure_budget: u64,
  hasher: H,
  _key_marker: PhantomData<K>,
  _value_marker: PhantomData<V>,
}

impl<K, V, H> fmt::Debug for VolatileCacheBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("VolatileCacheBuilder")
      .field("shards", &self.shards)
      .field("finalize_batch", &self.finalize_batch)
      .field("pressure_budget", &self.pressure_budget)
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
impl<K, V, H> VolatileCacheBuilder<K, V, H> {
  /// Sets the number of concurrent shards to use.
  pub fn shards(mut self, shards: usize) -> Self {
    // Zero is kept so that `build` can reject it.
    self.shards = if shards == 0 { 0 } else { shards.next_power_of_two() };
    self
  }

  /// Sets how many reclamation notices `finalize_reclaimed` processes per
  /// call. Bounds the per-frame cost of finalizing regardless of cache size.
  pub fn finalize_batch(mut self, batch: usize) -> Self {
    self.finalize_batch = batch;
    self
  }

  /// Sets the total weight the pressure-tolerant tier may hold before its
  /// oldest slots are demoted.
  pub fn pressure_budget(mut self, budget: u64) -> Self {
    self.pressure_budget = budget;
    self
  }

  /// Lets the pressure-tolerant tier grow without bound.
  pub fn unbounded(mut self) -> Self {
    self.pressure_budget = u64::MAX;
    self
  }

  /// Sets the hasher for the cache.
  pub fn hasher<S>(self, hasher: S) -> VolatileCacheBuilder<K, V, S> {
    VolatileCacheBuilder {
      shards: self.shards,
      finalize_batch: self.finalize_batch,
      pressure_budget: self.pressure_budget,
      hasher,
      _key_marker: PhantomData,
      _value_marker: PhantomData,
    }
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.shards == 0 {
      return Err(BuildError::ZeroShards);
    }
    if self.finalize_batch == 0 {
      return Err(BuildError::ZeroFinalizeBatch);
    }
    Ok(())
  }
}

// --- Default Constructor ---
impl<K, V, H: BuildHasher + Default> VolatileCacheBuilder<K, V, H> {
  /// Creates a new `VolatileCacheBuilder` with default settings.
  pub fn new() -> Self {
    Self {
      shards: (num_cpus::get() * 4).max(1).next_power_of_two(),
      finalize_batch: DEFAULT_FINALIZE_BATCH,
      pressure_budget: u64::MAX,
      hasher: H::default(),
      _key_marker: PhantomData,
      _value_marker: PhantomData,
    }
  }
}

impl<K, V> Default for VolatileCacheBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- Build Methods ---
impl<K, V, H> VolatileCacheBuilder<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: VolatileValue + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Builds the cache.
  pub fn build(self) -> Result<VolatileCache<K, V, H>, BuildError> {
    self.validate()?;
    let store = ShardedStore::new(self.shards, self.hasher);
    let shared = CacheShared::new(store, self.pressure_budget, self.finalize_batch);
    tracing::debug!(
      shards = self.shards,
      finalize_batch = self.finalize_batch,
      pressure_budget = self.pressure_budget,
      "volatile cache built"
    );
    Ok(VolatileCache {
      shared: Arc::new(shared),
    })
  }
}
