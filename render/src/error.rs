use thiserror::Error;

/// Errors that can occur when assembling a projector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectorError {
  /// Every source raster needs exactly one child projector producing it.
  #[error("got {children} child projectors for {sources} source rasters")]
  SourceCountMismatch { children: usize, sources: usize },
  /// A source raster does not cover the target raster.
  #[error("source {index} is {source_width}x{source_height}, target is {target_width}x{target_height}")]
  DimensionMismatch {
    index: usize,
    source_width: usize,
    source_height: usize,
    target_width: usize,
    target_height: usize,
  },
  /// A source raster is the target raster itself.
  #[error("source {index} is the target raster")]
  SourceAliasesTarget { index: usize },
  /// The worker pool was configured with zero threads.
  #[error("worker pool cannot have zero threads")]
  ZeroWorkers,
}

/// Errors that can occur when creating a raster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterError {
  #[error("{width}x{height} raster needs {expected} pixels, got {actual}")]
  LengthMismatch {
    width: usize,
    height: usize,
    expected: usize,
    actual: usize,
  },
}
