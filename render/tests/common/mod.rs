#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tessella_render::{shared, Projector, Raster, SharedRaster};

pub const WIDTH: usize = 2;
pub const HEIGHT: usize = 2;

type Hook = Box<dyn Fn() + Send + Sync>;

/// A leaf projector that writes a fixed set of pixels into its raster and
/// records how it was driven.
pub struct StubProjector {
  target: SharedRaster<u32>,
  pixels: Vec<u32>,
  valid: AtomicBool,
  valid_after_map: bool,
  map_result: bool,
  on_map: Option<Hook>,
  pub maps: AtomicUsize,
  pub cancels: AtomicUsize,
}

impl StubProjector {
  fn build(pixels: Vec<u32>, width: usize, height: usize, valid: bool) -> Self {
    let target = shared(Raster::new(width, height, 0));
    Self {
      target,
      pixels,
      valid: AtomicBool::new(valid),
      valid_after_map: valid,
      map_result: true,
      on_map: None,
      maps: AtomicUsize::new(0),
      cancels: AtomicUsize::new(0),
    }
  }

  /// A child that already holds finished pixels and never needs mapping.
  pub fn finished(pixels: Vec<u32>) -> Self {
    let stub = Self::build(pixels, WIDTH, HEIGHT, true);
    stub.draw();
    stub
  }

  /// A child whose pixels are placeholders and stay that way.
  pub fn loading(pixels: Vec<u32>) -> Self {
    Self::build(pixels, WIDTH, HEIGHT, false)
  }

  pub fn sized(width: usize, height: usize, pixels: Vec<u32>, valid: bool) -> Self {
    let stub = Self::build(pixels, width, height, valid);
    stub.draw();
    stub
  }

  /// Becomes valid the first time it is mapped.
  pub fn becomes_valid(mut self) -> Self {
    self.valid_after_map = true;
    self
  }

  /// Reports a cancelled frame from every `map`.
  pub fn cancelled_on_map(mut self) -> Self {
    self.map_result = false;
    self
  }

  pub fn with_hook<F: Fn() + Send + Sync + 'static>(mut self, hook: F) -> Self {
    self.on_map = Some(Box::new(hook));
    self
  }

  pub fn raster(&self) -> SharedRaster<u32> {
    self.target.clone()
  }

  pub fn maps(&self) -> usize {
    self.maps.load(Ordering::SeqCst)
  }

  pub fn cancels(&self) -> usize {
    self.cancels.load(Ordering::SeqCst)
  }

  fn draw(&self) {
    self.target.write().pixels_mut().copy_from_slice(&self.pixels);
  }
}

impl Projector for StubProjector {
  fn map(&self, _clear_untouched: bool) -> bool {
    self.maps.fetch_add(1, Ordering::SeqCst);
    if let Some(hook) = &self.on_map {
      hook();
    }
    if !self.map_result {
      return false;
    }
    self.draw();
    self.valid.store(self.valid_after_map, Ordering::SeqCst);
    true
  }

  fn cancel(&self) {
    self.cancels.fetch_add(1, Ordering::SeqCst);
  }

  fn is_valid(&self) -> bool {
    self.valid.load(Ordering::SeqCst)
  }

  fn last_frame_render_time(&self) -> Option<Duration> {
    None
  }
}

pub fn boxed(stub: &Arc<StubProjector>) -> Box<dyn Projector> {
  Box::new(stub.clone())
}

pub fn target() -> SharedRaster<u32> {
  shared(Raster::new(WIDTH, HEIGHT, 0xDEAD))
}
