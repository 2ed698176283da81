use crate::projector::{FrameTime, Projector};
use crate::raster::SharedRaster;

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tessella_cache::{VolatileCache, VolatileValue};

/// A cached value that can be drawn: it exposes its pixels in the same
/// row-major layout as the raster it is drawn into.
pub trait TilePixels<T> {
  fn pixels(&self) -> &[T];
}

impl<T> TilePixels<T> for tessella_cache::Volatile<Vec<T>> {
  fn pixels(&self) -> &[T] {
    self.get()
  }
}

/// A leaf projector that draws whatever a cache currently holds for one key.
///
/// The projector never loads anything itself. It is valid once the value it
/// copied was finished and covered the whole target.
pub struct EntryProjector<K, V, T>
where
  K: Clone + Send,
{
  cache: VolatileCache<K, V>,
  key: K,
  target: SharedRaster<T>,
  background: T,
  cancelled: AtomicBool,
  valid: AtomicBool,
  frame_time: FrameTime,
}

impl<K, V, T> EntryProjector<K, V, T>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: VolatileValue + TilePixels<T> + 'static,
  T: Clone + Send + Sync,
{
  /// Draws the entry for `key` into `target`. Pixels the entry does not cover
  /// are reset to `background` when the frame asks for it.
  pub fn new(cache: VolatileCache<K, V>, key: K, target: SharedRaster<T>, background: T) -> Self {
    Self {
      cache,
      key,
      target,
      background,
      cancelled: AtomicBool::new(false),
      valid: AtomicBool::new(false),
      frame_time: FrameTime::new(),
    }
  }

  pub fn key(&self) -> &K {
    &self.key
  }

  pub fn target(&self) -> &SharedRaster<T> {
    &self.target
  }
}

impl<K, V, T> Projector for EntryProjector<K, V, T>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: VolatileValue + TilePixels<T> + 'static,
  T: Clone + Send + Sync,
{
  fn map(&self, clear_untouched: bool) -> bool {
    self.cancelled.store(false, Ordering::Release);
    let start = Instant::now();

    let value = self.cache.get(&self.key).map(|entry| entry.value());
    if self.cancelled.load(Ordering::Acquire) {
      return false;
    }

    let mut target = self.target.write();
    let pixels = target.pixels_mut();
    let (copied, valid) = match &value {
      Some(value) => {
        let source = value.pixels();
        let copied = source.len().min(pixels.len());
        pixels[..copied].clone_from_slice(&source[..copied]);
        (copied, value.is_valid() && copied == pixels.len())
      }
      None => (0, false),
    };
    if clear_untouched {
      pixels[copied..].fill(self.background.clone());
    }
    drop(target);
    self.valid.store(valid, Ordering::Release);

    let elapsed = start.elapsed();
    self.frame_time.record(elapsed);
    tracing::trace!(copied, valid, elapsed_us = elapsed.as_micros() as u64, "drew cache entry");
    true
  }

  fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
  }

  fn is_valid(&self) -> bool {
    self.valid.load(Ordering::Acquire)
  }

  fn last_frame_render_time(&self) -> Option<Duration> {
    self.frame_time.get()
  }
}

impl<K, V, T> fmt::Debug for EntryProjector<K, V, T>
where
  K: Clone + Send + fmt::Debug,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EntryProjector")
      .field("key", &self.key)
      .field("valid", &self.valid.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}
