use crate::error::ProjectorError;
use crate::partition::partitions;
use crate::pool::WorkerPool;
use crate::projector::{FrameTime, Projector};
use crate::raster::SharedRaster;

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Combines the pixels found at one position of every source raster into
/// the target pixel at the same position.
///
/// `sources` is always in the order the sources were given to the
/// projector.
pub trait Accumulator<A, B>: Send + Sync {
  fn accumulate(&self, sources: &[&A], target: &mut B);
}

impl<A, B, F> Accumulator<A, B> for F
where
  F: Fn(&[&A], &mut B) + Send + Sync,
{
  #[inline]
  fn accumulate(&self, sources: &[&A], target: &mut B) {
    self(sources, target)
  }
}

/// A composite projector that blends the rasters of its children into one
/// target raster.
///
/// Each frame maps every child that is not yet valid, then splits the target
/// into row-aligned partitions and accumulates them on the worker pool. The
/// projector is valid only if every child is.
pub struct AccumulateProjector<A, B> {
  children: Vec<Box<dyn Projector>>,
  sources: Vec<SharedRaster<A>>,
  accumulator: Box<dyn Accumulator<A, B>>,
  target: SharedRaster<B>,
  pool: WorkerPool,
  cancelled: AtomicBool,
  valid: AtomicBool,
  frame_time: FrameTime,
}

impl<A, B> AccumulateProjector<A, B>
where
  A: Send + Sync + 'static,
  B: Send + Sync + 'static,
{
  /// Creates a projector combining `sources` into `target`.
  ///
  /// `children[i]` is the projector that renders `sources[i]`. Every source
  /// must have the target's dimensions and no source may be the target.
  pub fn new<F>(
    children: Vec<Box<dyn Projector>>,
    sources: Vec<SharedRaster<A>>,
    accumulator: F,
    target: SharedRaster<B>,
    pool: WorkerPool,
  ) -> Result<Self, ProjectorError>
  where
    F: Accumulator<A, B> + 'static,
  {
    if children.len() != sources.len() {
      return Err(ProjectorError::SourceCountMismatch {
        children: children.len(),
        sources: sources.len(),
      });
    }
    if pool.threads() == 0 {
      return Err(ProjectorError::ZeroWorkers);
    }

    let target_ptr = Arc::as_ptr(&target) as *const ();
    let (target_width, target_height) = target.read().dimensions();
    for (index, source) in sources.iter().enumerate() {
      if Arc::as_ptr(source) as *const () == target_ptr {
        return Err(ProjectorError::SourceAliasesTarget { index });
      }
      let (source_width, source_height) = source.read().dimensions();
      if (source_width, source_height) != (target_width, target_height) {
        return Err(ProjectorError::DimensionMismatch {
          index,
          source_width,
          source_height,
          target_width,
          target_height,
        });
      }
    }

    Ok(Self {
      children,
      sources,
      accumulator: Box::new(accumulator),
      target,
      pool,
      cancelled: AtomicBool::new(false),
      valid: AtomicBool::new(false),
      frame_time: FrameTime::new(),
    })
  }

  /// The raster this projector renders into.
  pub fn target(&self) -> &SharedRaster<B> {
    &self.target
  }

  pub fn pool(&self) -> &WorkerPool {
    &self.pool
  }

  /// Maps the children that still need it. Returns `None` if one of them was
  /// cancelled, otherwise whether all of them are now valid.
  fn map_children(&self, clear_untouched: bool) -> Option<bool> {
    let mut valid = true;
    for child in &self.children {
      if child.is_valid() {
        continue;
      }
      if !child.map(clear_untouched) {
        return None;
      }
      valid &= child.is_valid();
    }
    Some(valid)
  }

  /// Accumulates every partition of the target on the worker pool. Returns
  /// `false` if the partitions could not be run at all.
  fn accumulate_partitions(&self) -> bool {
    // The same raster may be listed more than once.
    let sources: Vec<_> = self.sources.iter().map(|source| source.read_recursive()).collect();
    let mut target = self.target.write();
    let (width, height) = target.dimensions();

    // Shared rasters can be swapped out from under us between frames.
    if let Some(index) = sources.iter().position(|s| s.dimensions() != (width, height)) {
      tracing::warn!(
        index,
        target_width = width,
        target_height = height,
        "source raster no longer matches the target, skipping frame"
      );
      return false;
    }

    let ranges = partitions(width, height, self.pool.threads());
    if ranges.is_empty() {
      return true;
    }

    let source_pixels: Vec<&[A]> = sources.iter().map(|s| s.pixels()).collect();
    let mut tasks = Vec::with_capacity(ranges.len());
    let mut rest = target.pixels_mut();
    for range in &ranges {
      let (chunk, tail) = mem::take(&mut rest).split_at_mut(range.len());
      tasks.push((range.start, chunk));
      rest = tail;
    }

    let cancelled = &self.cancelled;
    let accumulator = &*self.accumulator;
    let source_pixels = &source_pixels;
    let outcome = self.pool.install(move |pool| {
      pool.scope(move |scope| {
        for (offset, chunk) in tasks {
          scope.spawn(move |_| {
            if cancelled.load(Ordering::Acquire) {
              return;
            }
            let mut at: Vec<&A> = Vec::with_capacity(source_pixels.len());
            for (i, pixel) in chunk.iter_mut().enumerate() {
              at.clear();
              at.extend(source_pixels.iter().map(|source| &source[offset + i]));
              accumulator.accumulate(&at, pixel);
            }
          });
        }
      })
    });

    match outcome {
      Ok(()) => true,
      Err(err) => {
        tracing::error!(error = %err, "failed to build worker pool for frame");
        false
      }
    }
  }
}

impl<A, B> Projector for AccumulateProjector<A, B>
where
  A: Send + Sync + 'static,
  B: Send + Sync + 'static,
{
  fn map(&self, clear_untouched: bool) -> bool {
    self.cancelled.store(false, Ordering::Release);
    let start = Instant::now();

    let Some(children_valid) = self.map_children(clear_untouched) else {
      self.valid.store(false, Ordering::Release);
      return false;
    };
    self.valid.store(children_valid, Ordering::Release);

    let completed = !self.cancelled.load(Ordering::Acquire)
      && self.accumulate_partitions()
      && !self.cancelled.load(Ordering::Acquire);
    if !completed {
      self.valid.store(false, Ordering::Release);
    }

    let elapsed = start.elapsed();
    self.frame_time.record(elapsed);
    tracing::trace!(
      sources = self.sources.len(),
      workers = self.pool.threads(),
      elapsed_us = elapsed.as_micros() as u64,
      completed,
      "accumulated frame"
    );

    completed
  }

  fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
    for child in &self.children {
      child.cancel();
    }
  }

  fn is_valid(&self) -> bool {
    self.valid.load(Ordering::Acquire)
  }

  fn last_frame_render_time(&self) -> Option<Duration> {
    self.frame_time.get()
  }
}

impl<A, B> fmt::Debug for AccumulateProjector<A, B> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AccumulateProjector")
      .field("children", &self.children.len())
      .field("pool", &self.pool)
      .field("valid", &self.valid.load(Ordering::Relaxed))
      .field("last_frame", &self.frame_time.get())
      .finish_non_exhaustive()
  }
}
