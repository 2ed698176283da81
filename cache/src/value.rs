/// A value that may still be a placeholder.
///
/// Validity is expected to be monotonic for a single value instance: once a
/// value reports `true` it must never report `false` again. The cache relies
/// on this to skip locking on the fast path of
/// [`load_if_not_valid`](crate::VolatileEntry::load_if_not_valid).
pub trait VolatileValue: Send + Sync {
  /// Returns `true` once the value holds finished data.
  fn is_valid(&self) -> bool;

  /// The cost charged against the cache's pressure budget while this value
  /// is held in the pressure-tolerant tier.
  fn weight(&self) -> u64 {
    1
  }
}

/// A simple volatile wrapper pairing arbitrary data with a validity flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volatile<T> {
  data: T,
  valid: bool,
}

impl<T> Volatile<T> {
  /// Wraps data that stands in for a value that is still loading.
  pub fn placeholder(data: T) -> Self {
    Self { data, valid: false }
  }

  /// Wraps finished data.
  pub fn ready(data: T) -> Self {
    Self { data, valid: true }
  }

  #[inline]
  pub fn get(&self) -> &T {
    &self.data
  }

  pub fn into_inner(self) -> T {
    self.data
  }
}

impl<T: Send + Sync> VolatileValue for Volatile<T> {
  #[inline]
  fn is_valid(&self) -> bool {
    self.valid
  }
}
