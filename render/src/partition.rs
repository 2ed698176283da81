use std::ops::Range;

/// How many tasks a frame of `height` rows is split into for `workers`
/// threads: ten per worker, but never more than one per row.
#[inline]
pub fn partition_count(workers: usize, height: usize) -> usize {
  workers.saturating_mul(10).min(height)
}

/// Splits a `width` x `height` raster into contiguous, row-aligned ranges of
/// flat pixel indices, one per task.
///
/// The ranges are in order, do not overlap, and together cover
/// `0..width * height` exactly once. Row counts differ by at most one.
pub fn partitions(width: usize, height: usize, workers: usize) -> Vec<Range<usize>> {
  let count = partition_count(workers, height);
  (0..count)
    .map(|i| {
      let first_row = i * height / count;
      let end_row = (i + 1) * height / count;
      first_row * width..end_row * width
    })
    .collect()
}
