use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Something that renders into a target raster, possibly from data that is
/// still loading.
///
/// Projectors form a tree: composite projectors map their children first and
/// then combine the children's rasters into their own.
pub trait Projector: Send + Sync {
  /// Renders one frame into the target raster.
  ///
  /// When `clear_untouched` is set, target pixels that have no source data
  /// are reset instead of keeping whatever the previous frame left there.
  ///
  /// Returns `false` if the frame was cancelled. A cancelled frame may have
  /// written some target pixels but not others.
  fn map(&self, clear_untouched: bool) -> bool;

  /// Renders one frame, clearing untouched target pixels.
  fn map_default(&self) -> bool {
    self.map(true)
  }

  /// Asks an in-flight `map` to stop as soon as possible. Idempotent.
  fn cancel(&self);

  /// Whether the last frame was rendered entirely from finished data.
  fn is_valid(&self) -> bool;

  /// How long the last completed frame took, or `None` before the first one.
  fn last_frame_render_time(&self) -> Option<Duration>;
}

impl<P: Projector + ?Sized> Projector for Box<P> {
  fn map(&self, clear_untouched: bool) -> bool {
    (**self).map(clear_untouched)
  }

  fn cancel(&self) {
    (**self).cancel()
  }

  fn is_valid(&self) -> bool {
    (**self).is_valid()
  }

  fn last_frame_render_time(&self) -> Option<Duration> {
    (**self).last_frame_render_time()
  }
}

impl<P: Projector + ?Sized> Projector for std::sync::Arc<P> {
  fn map(&self, clear_untouched: bool) -> bool {
    (**self).map(clear_untouched)
  }

  fn cancel(&self) {
    (**self).cancel()
  }

  fn is_valid(&self) -> bool {
    (**self).is_valid()
  }

  fn last_frame_render_time(&self) -> Option<Duration> {
    (**self).last_frame_render_time()
  }
}

const NO_FRAME: u64 = u64::MAX;

/// The render time of the last frame, readable from any thread.
#[derive(Debug)]
pub(crate) struct FrameTime {
  nanos: AtomicU64,
}

impl FrameTime {
  pub(crate) fn new() -> Self {
    Self {
      nanos: AtomicU64::new(NO_FRAME),
    }
  }

  pub(crate) fn record(&self, elapsed: Duration) {
    let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(NO_FRAME - 1);
    self.nanos.store(nanos.min(NO_FRAME - 1), Ordering::Release);
  }

  pub(crate) fn get(&self) -> Option<Duration> {
    match self.nanos.load(Ordering::Acquire) {
      NO_FRAME => None,
      nanos => Some(Duration::from_nanos(nanos)),
    }
  }
}
