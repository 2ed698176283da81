use crate::entry::VolatileEntry;
use crate::error::LoadError;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::pressure::PressureLedger;
use crate::store::{ShardedStore, Slot, SlotId};
use crate::value::VolatileValue;

use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::fmt;

use fibre::mpsc;
use parking_lot::Mutex;

/// The callbacks an entry uses to talk back to the cache that created it.
///
/// Entries only hold a weak reference to their owner, so an entry that
/// outlives its cache simply stops reporting.
pub(crate) trait SlotOwner<K: Clone, V>: Send + Sync {
  /// The entry's loader returned a value.
  fn loaded(&self, entry: &Arc<VolatileEntry<K, V>>);
  /// The last owner of an entry attached to `slot` went away.
  fn reclaimed(&self, key: K, slot: SlotId);
  fn load_failed(&self, err: &LoadError);
}

/// A reclamation notice: the entry behind slot `slot` for `key` was dropped.
#[derive(Debug)]
pub(crate) struct Notice<K> {
  pub(crate) key: K,
  pub(crate) slot: SlotId,
}

/// The internal, thread-safe core of the cache.
pub(crate) struct CacheShared<K: Clone + Send, V, H> {
  pub(crate) store: ShardedStore<K, V, H>,
  /// The coarse lock. Every mutation of the store and every finalize pass
  /// runs under it; lookups never touch it.
  pub(crate) ledger: Mutex<PressureLedger<K>>,
  notice_tx: mpsc::UnboundedSender<Notice<K>>,
  notice_rx: Mutex<mpsc::UnboundedReceiver<Notice<K>>>,
  pending: AtomicUsize,
  pub(crate) metrics: Metrics,
  pub(crate) finalize_batch: usize,
}

impl<K: Clone + Send, V, H> fmt::Debug for CacheShared<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("store", &self.store)
      .field("pending_notices", &self.pending.load(Ordering::Relaxed))
      .field("finalize_batch", &self.finalize_batch)
      .finish_non_exhaustive()
  }
}

impl<K, V, H> CacheShared<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: VolatileValue + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  pub(crate) fn new(
    store: ShardedStore<K, V, H>,
    pressure_budget: u64,
    finalize_batch: usize,
  ) -> Self {
    let (notice_tx, notice_rx) = mpsc::unbounded();
    Self {
      store,
      ledger: Mutex::new(PressureLedger::new(pressure_budget)),
      notice_tx,
      notice_rx: Mutex::new(notice_rx),
      pending: AtomicUsize::new(0),
      metrics: Metrics::new(),
      finalize_batch,
    }
  }

  /// Installs `slot` for `key`, keeping the ledger in step with the store.
  ///
  /// The replaced slot, if any, is detached from its entry and returned so
  /// the caller can drop it once the coarse lock is released.
  pub(crate) fn install(
    &self,
    ledger: &mut PressureLedger<K>,
    key: K,
    slot: Slot<K, V>,
  ) -> Option<Slot<K, V>> {
    if slot.is_pressure() {
      ledger.charge(key.clone(), slot.id, slot.weight);
    }
    let replaced = self.store.insert(key, slot);
    if let Some(old) = &replaced {
      if old.is_pressure() {
        ledger.release(old.weight);
      }
      old.invalidate();
    }
    replaced
  }

  /// Demotes the oldest pressure slots until the tier fits its budget.
  ///
  /// Returns the owning references released by the demotion; dropping them
  /// frees every entry that nobody else holds.
  pub(crate) fn relieve(
    &self,
    ledger: &mut PressureLedger<K>,
  ) -> Vec<Arc<VolatileEntry<K, V>>> {
    let mut released = Vec::new();
    while ledger.over_budget() {
      let Some((key, id)) = ledger.pop_oldest() else {
        break;
      };
      if let Some((entry, weight)) = self.store.demote_if_identical(&key, id) {
        ledger.release(weight);
        Metrics::bump(&self.metrics.demotions);
        released.push(entry);
      }
    }
    ledger.compact(|key, id| self.store.is_current_pressure(key, id));

    if !released.is_empty() {
      tracing::debug!(
        demoted = released.len(),
        weight = ledger.weight(),
        budget = ledger.budget(),
        "pressure tier over budget"
      );
    }
    released
  }

  /// Drains up to `max` reclamation notices, removing each slot that is
  /// still the one the notice was posted for.
  pub(crate) fn finalize(&self, max: usize) -> usize {
    let _ledger = self.ledger.lock();
    let rx = self.notice_rx.lock();

    let mut drained = 0;
    let mut removed = Vec::new();
    while drained < max {
      let Ok(notice) = rx.try_recv() else {
        break;
      };
      drained += 1;
      match self.store.remove_if_identical(&notice.key, notice.slot) {
        Some(slot) => removed.push(slot),
        None => Metrics::bump(&self.metrics.stale_notices),
      }
    }
    self.pending.fetch_sub(drained, Ordering::AcqRel);
    self
      .metrics
      .reclaimed
      .fetch_add(removed.len() as u64, Ordering::Relaxed);

    if drained > 0 {
      tracing::trace!(drained, removed = removed.len(), "finalized reclaimed entries");
    }
    drained
  }

  /// The number of reclamation notices waiting for finalize.
  #[inline]
  pub(crate) fn pending(&self) -> usize {
    self.pending.load(Ordering::Acquire)
  }

  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let weight = self.ledger.lock().weight();
    self.metrics.snapshot(weight)
  }
}

impl<K, V, H> SlotOwner<K, V> for CacheShared<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: VolatileValue + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  fn loaded(&self, entry: &Arc<VolatileEntry<K, V>>) {
    Metrics::bump(&self.metrics.loads);
    if !entry.is_valid() {
      return;
    }

    let slot = Slot::pressure(entry.clone(), entry.value().weight());
    entry.attach(slot.id);

    let (replaced, released) = {
      let mut ledger = self.ledger.lock();
      let replaced = self.install(&mut ledger, entry.key().clone(), slot);
      let released = self.relieve(&mut ledger);
      (replaced, released)
    };
    Metrics::bump(&self.metrics.upgrades);
    drop(replaced);
    drop(released);
  }

  fn reclaimed(&self, key: K, slot: SlotId) {
    self.pending.fetch_add(1, Ordering::AcqRel);
    if self.notice_tx.send(Notice { key, slot }).is_err() {
      self.pending.fetch_sub(1, Ordering::AcqRel);
    }
  }

  fn load_failed(&self, err: &LoadError) {
    if err.is_interrupted() {
      Metrics::bump(&self.metrics.interrupted_loads);
    } else {
      Metrics::bump(&self.metrics.load_failures);
    }
  }
}
