use crate::error::LoadError;
use crate::loader::VolatileLoader;
use crate::shared::SlotOwner;
use crate::store::{SlotId, NO_SLOT};
use crate::value::VolatileValue;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

/// Enqueue-frame marker of an entry that was never scheduled for loading.
pub const NEVER_ENQUEUED: i64 = -1;

/// Enqueue-frame marker of an entry whose value is valid. Such an entry never
/// needs to be scheduled again.
pub const LOADED: i64 = i64::MAX;

/// A shared handle to a cache entry.
///
/// Holding a handle keeps the entry alive even after the cache has dropped
/// its own slot for the key.
pub type EntryHandle<K, V> = Arc<VolatileEntry<K, V>>;

/// A mutable cell pairing a key with its current, possibly volatile, value.
pub struct VolatileEntry<K: Clone, V> {
  key: K,
  /// The current value. Replaced by a successful load.
  value: RwLock<Arc<V>>,
  /// Mirrors `value.is_valid()` so the fast path never takes a lock.
  valid: AtomicBool,
  loader: Arc<dyn VolatileLoader<K, V>>,
  /// Frame in which the external scheduler last enqueued this entry.
  enqueue_frame: AtomicI64,
  load_lock: Mutex<()>,
  load_done: Condvar,
  /// Identity of the cache slot currently referring to this entry.
  slot: AtomicU64,
  owner: Weak<dyn SlotOwner<K, V>>,
}

impl<K: Clone, V> VolatileEntry<K, V> {
  pub(crate) fn new(
    key: K,
    value: V,
    loader: Arc<dyn VolatileLoader<K, V>>,
    owner: Weak<dyn SlotOwner<K, V>>,
  ) -> Self
  where
    V: VolatileValue,
  {
    let valid = value.is_valid();
    Self {
      key,
      value: RwLock::new(Arc::new(value)),
      valid: AtomicBool::new(valid),
      loader,
      enqueue_frame: AtomicI64::new(NEVER_ENQUEUED),
      load_lock: Mutex::new(()),
      load_done: Condvar::new(),
      slot: AtomicU64::new(NO_SLOT),
      owner,
    }
  }

  #[inline]
  pub fn key(&self) -> &K {
    &self.key
  }

  /// Returns the value currently stored in the entry.
  ///
  /// The returned `Arc` stays usable even if the entry is loaded or evicted
  /// afterwards.
  #[inline]
  pub fn value(&self) -> Arc<V> {
    self.value.read().clone()
  }

  /// Returns `true` once the entry holds a finished value.
  #[inline]
  pub fn is_valid(&self) -> bool {
    self.valid.load(Ordering::Acquire)
  }

  /// The frame in which this entry was last enqueued for loading.
  ///
  /// Starts at [`NEVER_ENQUEUED`] and becomes [`LOADED`] once the value is
  /// valid.
  #[inline]
  pub fn enqueue_frame(&self) -> i64 {
    self.enqueue_frame.load(Ordering::Acquire)
  }

  #[inline]
  pub fn set_enqueue_frame(&self, frame: i64) {
    self.enqueue_frame.store(frame, Ordering::Release);
  }

  /// Blocks until the entry's value is valid or `timeout` elapses.
  ///
  /// Returns whether the value is valid on return. Without a timeout this
  /// waits for as long as it takes some other thread to load the entry.
  pub fn wait_until_valid(&self, timeout: Option<Duration>) -> bool {
    if self.is_valid() {
      return true;
    }

    match timeout {
      None => {
        let mut guard = self.load_lock.lock();
        while !self.is_valid() {
          self.load_done.wait(&mut guard);
        }
        true
      }
      Some(timeout) => {
        let deadline = Instant::now() + timeout;
        let Some(mut guard) = self.load_lock.try_lock_until(deadline) else {
          return self.is_valid();
        };
        while !self.is_valid() {
          if self.load_done.wait_until(&mut guard, deadline).timed_out() {
            return self.is_valid();
          }
        }
        true
      }
    }
  }

  #[inline]
  pub(crate) fn slot_id(&self) -> SlotId {
    self.slot.load(Ordering::Acquire)
  }

  #[inline]
  pub(crate) fn attach(&self, id: SlotId) {
    self.slot.store(id, Ordering::Release);
  }

  /// Forgets the slot `id` so that dropping this entry does not post a
  /// reclamation notice for it. Fails if the entry was re-attached since.
  #[inline]
  pub(crate) fn detach(&self, id: SlotId) -> bool {
    self
      .slot
      .compare_exchange(id, NO_SLOT, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }
}

impl<K, V> VolatileEntry<K, V>
where
  K: Clone,
  V: VolatileValue,
{
  /// Loads the entry's value unless it is already valid.
  ///
  /// Concurrent callers serialize on this entry alone; exactly one of them
  /// runs the loader and the rest return once it is done. On success the
  /// entry's enqueue-frame marker becomes [`LOADED`] and its cache slot is
  /// upgraded to the pressure-tolerant tier.
  ///
  /// On failure the entry keeps its old value and stays retryable.
  pub fn load_if_not_valid(self: &Arc<Self>) -> Result<(), LoadError> {
    if self.is_valid() {
      return Ok(());
    }

    let _guard = self.load_lock.lock();
    // Another thread may have finished while we were waiting for the lock.
    if self.is_valid() {
      return Ok(());
    }

    let loaded = match self.loader.load(&self.key) {
      Ok(value) => value,
      Err(err) => {
        tracing::debug!(slot = self.slot_id(), error = %err, "volatile entry failed to load");
        if let Some(owner) = self.owner.upgrade() {
          owner.load_failed(&err);
        }
        return Err(err);
      }
    };

    let now_valid = loaded.is_valid();
    *self.value.write() = Arc::new(loaded);

    if now_valid {
      self.enqueue_frame.store(LOADED, Ordering::Release);
      self.valid.store(true, Ordering::Release);
    } else {
      tracing::warn!(slot = self.slot_id(), "loader returned a value that is still invalid");
    }
    if let Some(owner) = self.owner.upgrade() {
      owner.loaded(self);
    }
    if !now_valid {
      return Ok(());
    }
    self.load_done.notify_all();

    tracing::trace!(slot = self.slot_id(), "volatile entry loaded");
    Ok(())
  }
}

impl<K: Clone, V> Drop for VolatileEntry<K, V> {
  fn drop(&mut self) {
    let slot = *self.slot.get_mut();
    if slot == NO_SLOT {
      return;
    }
    if let Some(owner) = self.owner.upgrade() {
      owner.reclaimed(self.key.clone(), slot);
    }
  }
}

impl<K: Clone + fmt::Debug, V> fmt::Debug for VolatileEntry<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("VolatileEntry")
      .field("key", &self.key)
      .field("valid", &self.is_valid())
      .field("enqueue_frame", &self.enqueue_frame())
      .finish_non_exhaustive()
  }
}
