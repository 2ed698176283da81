use std::error::Error as StdError;

use thiserror::Error;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The cache was configured with zero shards, which is not allowed.
  #[error("shard count cannot be zero")]
  ZeroShards,
  /// The cache was configured to finalize zero reclamation notices per call,
  /// which would let the notice channel grow without bound.
  #[error("finalize batch size cannot be zero")]
  ZeroFinalizeBatch,
}

/// The reasons a call to [`load_if_not_valid`] can fail.
///
/// In both cases the entry keeps its previous (invalid) value and the next
/// caller is free to try again.
///
/// [`load_if_not_valid`]: crate::VolatileEntry::load_if_not_valid
#[derive(Debug, Error)]
pub enum LoadError {
  /// The loader gave up because the work it was doing was cancelled.
  #[error("loading was interrupted")]
  Interrupted,
  /// The loader failed for any other reason.
  #[error("loading failed: {0}")]
  Failed(#[source] Box<dyn StdError + Send + Sync>),
}

impl LoadError {
  /// Wraps an arbitrary error as a loader fault.
  pub fn failed<E>(err: E) -> Self
  where
    E: Into<Box<dyn StdError + Send + Sync>>,
  {
    LoadError::Failed(err.into())
  }

  /// Returns `true` if the load was interrupted rather than faulted.
  #[inline]
  pub fn is_interrupted(&self) -> bool {
    matches!(self, LoadError::Interrupted)
  }
}
