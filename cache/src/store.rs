use crate::entry::VolatileEntry;

use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

/// Identity token of a single insertion into the store.
///
/// Two slots for the same key never share an id, which is what lets finalize
/// tell a stale reclamation notice from a fresh one.
pub(crate) type SlotId = u64;

/// Marks an entry that no slot refers to.
pub(crate) const NO_SLOT: SlotId = 0;

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);

#[inline]
pub(crate) fn next_slot_id() -> SlotId {
  NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<K: Hash, H: BuildHasher>(hasher: &H, key: &K) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

/// How strongly a slot holds on to its entry.
pub(crate) enum Strength<K: Clone, V> {
  /// Released the moment nothing outside the cache holds the entry.
  Eager(Weak<VolatileEntry<K, V>>),
  /// Owned by the cache until the pressure budget forces a demotion.
  Pressure(Arc<VolatileEntry<K, V>>),
}

/// The value stored in the map for a key.
pub(crate) struct Slot<K: Clone, V> {
  pub(crate) id: SlotId,
  /// Weight charged to the pressure budget. Zero for eager slots.
  pub(crate) weight: u64,
  pub(crate) strength: Strength<K, V>,
}

impl<K: Clone, V> Slot<K, V> {
  pub(crate) fn eager(entry: &Arc<VolatileEntry<K, V>>) -> Self {
    Self {
      id: next_slot_id(),
      weight: 0,
      strength: Strength::Eager(Arc::downgrade(entry)),
    }
  }

  pub(crate) fn pressure(entry: Arc<VolatileEntry<K, V>>, weight: u64) -> Self {
    Self {
      id: next_slot_id(),
      weight,
      strength: Strength::Pressure(entry),
    }
  }

  /// Returns the entry if it is still alive.
  #[inline]
  pub(crate) fn entry(&self) -> Option<Arc<VolatileEntry<K, V>>> {
    match &self.strength {
      Strength::Eager(weak) => weak.upgrade(),
      Strength::Pressure(entry) => Some(entry.clone()),
    }
  }

  #[inline]
  pub(crate) fn is_pressure(&self) -> bool {
    matches!(self.strength, Strength::Pressure(_))
  }

  /// Detaches the entry from this slot so it no longer reports to the cache
  /// when dropped.
  pub(crate) fn invalidate(&self) {
    if let Some(entry) = self.entry() {
      entry.detach(self.id);
    }
  }
}

type ShardMap<K, V, H> = HashMap<K, Slot<K, V>, H>;

/// A slot store that is partitioned into multiple, independently locked shards.
///
/// Lookups take a shard read lock only. Every mutation of a single key is
/// atomic under that key's shard write lock.
pub(crate) struct ShardedStore<K: Clone, V, H> {
  shards: Box<[CachePadded<RwLock<ShardMap<K, V, H>>>]>,
  hasher: H,
}

impl<K: Clone, V, H> fmt::Debug for ShardedStore<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<K, V, H> ShardedStore<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  /// Creates a new `ShardedStore` with the specified number of shards and hasher.
  pub(crate) fn new(num_shards: usize, hasher: H) -> Self {
    let mut shards = Vec::with_capacity(num_shards);
    for _ in 0..num_shards {
      let shard_map = HashMap::with_hasher(hasher.clone());
      shards.push(CachePadded::new(RwLock::new(shard_map)));
    }

    Self {
      shards: shards.into_boxed_slice(),
      hasher,
    }
  }

  #[inline]
  fn shard(&self, key: &K) -> &RwLock<ShardMap<K, V, H>> {
    let hash = hash_key(&self.hasher, key);
    // The builder guarantees at least one shard.
    &self.shards[hash as usize % self.shards.len()]
  }

  /// Returns the live entry installed for `key`, if any.
  pub(crate) fn get(&self, key: &K) -> Option<Arc<VolatileEntry<K, V>>> {
    self.shard(key).read().get(key).and_then(Slot::entry)
  }

  /// Installs `slot` for `key`, returning the slot it replaced.
  pub(crate) fn insert(&self, key: K, slot: Slot<K, V>) -> Option<Slot<K, V>> {
    self.shard(&key).write().insert(key, slot)
  }

  /// Removes the slot for `key` only if it is the very slot `id`.
  pub(crate) fn remove_if_identical(&self, key: &K, id: SlotId) -> Option<Slot<K, V>> {
    let mut guard = self.shard(key).write();
    match guard.get(key) {
      Some(slot) if slot.id == id => guard.remove(key),
      _ => None,
    }
  }

  /// Downgrades the pressure slot `id` for `key` to the eager tier, keeping
  /// its identity. Returns the owning reference that was released together
  /// with the weight it was charged.
  pub(crate) fn demote_if_identical(
    &self,
    key: &K,
    id: SlotId,
  ) -> Option<(Arc<VolatileEntry<K, V>>, u64)> {
    let mut guard = self.shard(key).write();
    let slot = guard.get_mut(key).filter(|slot| slot.id == id)?;
    let Strength::Pressure(entry) = &slot.strength else {
      return None;
    };

    let demoted = Strength::Eager(Arc::downgrade(entry));
    match mem::replace(&mut slot.strength, demoted) {
      Strength::Pressure(entry) => Some((entry, mem::take(&mut slot.weight))),
      Strength::Eager(_) => None,
    }
  }

  /// Returns `true` if `id` is still the pressure slot installed for `key`.
  pub(crate) fn is_current_pressure(&self, key: &K, id: SlotId) -> bool {
    self
      .shard(key)
      .read()
      .get(key)
      .is_some_and(|slot| slot.id == id && slot.is_pressure())
  }

  /// Empties every shard, returning the removed slots.
  ///
  /// All shard write locks are held at once so no reader observes a
  /// partially cleared store.
  pub(crate) fn drain(&self) -> Vec<Slot<K, V>> {
    let mut guards = self
      .shards
      .iter()
      .map(|shard| shard.write())
      .collect::<Vec<_>>();

    let mut removed = Vec::new();
    for guard in guards.iter_mut() {
      removed.extend(guard.drain().map(|(_, slot)| slot));
    }
    removed
  }

  pub(crate) fn len(&self) -> usize {
    self.shards.iter().map(|shard| shard.read().len()).sum()
  }
}
