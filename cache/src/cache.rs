use crate::entry::{EntryHandle, VolatileEntry};
use crate::loader::VolatileLoader;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::shared::{CacheShared, SlotOwner};
use crate::store::Slot;
use crate::value::VolatileValue;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::{Arc, Weak};

/// A concurrent cache of volatile entries.
///
/// Slots holding a placeholder do not keep their entry alive: the entry goes
/// away as soon as its last external handle is dropped. Once an entry has
/// loaded, the cache owns it until the pressure budget is exceeded.
///
/// Dead slots are swept by [`finalize_reclaimed`](Self::finalize_reclaimed),
/// which is meant to be called once per rendered frame.
pub struct VolatileCache<K: Clone + Send, V, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
}

impl<K: Clone + Send, V, H> Clone for VolatileCache<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K: Clone + Send, V, H> fmt::Debug for VolatileCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("VolatileCache")
      .field("shared", &self.shared)
      .finish()
  }
}

impl<K, V, H> VolatileCache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: VolatileValue + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Creates an entry for `key` and installs it, replacing whatever was
  /// installed for the key before.
  ///
  /// A valid `value` goes straight to the pressure-tolerant tier. An invalid
  /// one is only referenced weakly, so the caller must hold on to the
  /// returned handle for the entry to survive.
  pub fn put<L>(&self, key: K, value: V, loader: L) -> EntryHandle<K, V>
  where
    L: VolatileLoader<K, V> + 'static,
  {
    self.put_shared(key, value, Arc::new(loader))
  }

  /// Like [`put`](Self::put), for a loader shared between many entries.
  pub fn put_shared(
    &self,
    key: K,
    value: V,
    loader: Arc<dyn VolatileLoader<K, V>>,
  ) -> EntryHandle<K, V> {
    let owner = Arc::downgrade(&self.shared);
    let owner: Weak<dyn SlotOwner<K, V>> = owner;
    let entry = Arc::new(VolatileEntry::new(key.clone(), value, loader, owner));

    let slot = if entry.is_valid() {
      Slot::pressure(entry.clone(), entry.value().weight())
    } else {
      Slot::eager(&entry)
    };
    entry.attach(slot.id);

    let (replaced, released) = {
      let mut ledger = self.shared.ledger.lock();
      let replaced = self.shared.install(&mut ledger, key, slot);
      let released = self.shared.relieve(&mut ledger);
      (replaced, released)
    };
    Metrics::bump(&self.shared.metrics.puts);
    drop(replaced);
    drop(released);

    entry
  }

  /// Returns the entry currently installed for `key`.
  ///
  /// Never blocks on loading. Returns `None` if nothing was installed, or if
  /// the installed entry has already been reclaimed.
  pub fn get(&self, key: &K) -> Option<EntryHandle<K, V>> {
    let found = self.shared.store.get(key);
    if found.is_some() {
      Metrics::bump(&self.shared.metrics.hits);
    } else {
      Metrics::bump(&self.shared.metrics.misses);
    }
    found
  }

  /// Removes every slot from the cache.
  ///
  /// Entries still held elsewhere stay usable, but they are detached from
  /// the cache: dropping them later produces no reclamation notice.
  pub fn clear(&self) {
    let removed = {
      let mut ledger = self.shared.ledger.lock();
      let removed = self.shared.store.drain();
      for slot in &removed {
        slot.invalidate();
      }
      ledger.reset();
      removed
    };
    Metrics::bump(&self.shared.metrics.clears);
    tracing::debug!(removed = removed.len(), "volatile cache cleared");
  }

  /// Sweeps slots whose entries were reclaimed, processing at most the
  /// configured batch of notices. Returns the number of notices processed.
  pub fn finalize_reclaimed(&self) -> usize {
    self.shared.finalize(self.shared.finalize_batch)
  }

  /// Sweeps slots whose entries were reclaimed, processing at most
  /// `max_batch` notices.
  ///
  /// A slot is only removed if it is the very slot the notice was posted
  /// for; a fresher entry installed for the same key is left alone.
  pub fn finalize_reclaimed_batch(&self, max_batch: usize) -> usize {
    self.shared.finalize(max_batch)
  }

  /// Demotes pressure slots until the pressure tier fits its budget.
  /// Returns the number of slots demoted.
  pub fn relieve_pressure(&self) -> usize {
    let released = {
      let mut ledger = self.shared.ledger.lock();
      self.shared.relieve(&mut ledger)
    };
    released.len()
  }

  /// Changes the pressure budget, demoting slots right away if the tier no
  /// longer fits.
  pub fn set_pressure_budget(&self, budget: u64) -> usize {
    let released = {
      let mut ledger = self.shared.ledger.lock();
      ledger.set_budget(budget);
      self.shared.relieve(&mut ledger)
    };
    released.len()
  }

  /// The number of slots in the cache, including dead ones that have not been
  /// finalized yet.
  pub fn len(&self) -> usize {
    self.shared.store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// The number of reclamation notices waiting for finalize.
  pub fn pending_reclaims(&self) -> usize {
    self.shared.pending()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.snapshot()
  }
}
