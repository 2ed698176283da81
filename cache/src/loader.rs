use crate::error::LoadError;

/// Produces the finished value for a key.
///
/// Concurrent callers of `load_if_not_valid` never run the loader twice for
/// the same entry, but a failed load may be retried later. It may block on
/// I/O; a loader that notices its work is no longer wanted should return
/// [`LoadError::Interrupted`].
pub trait VolatileLoader<K, V>: Send + Sync {
  fn load(&self, key: &K) -> Result<V, LoadError>;
}

impl<K, V, F> VolatileLoader<K, V> for F
where
  F: Fn(&K) -> Result<V, LoadError> + Send + Sync,
{
  #[inline]
  fn load(&self, key: &K) -> Result<V, LoadError> {
    self(key)
  }
}
