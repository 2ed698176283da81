use crate::error::RasterError;

use std::sync::Arc;

use parking_lot::RwLock;

/// A row-major 2D pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster<T> {
  width: usize,
  height: usize,
  pixels: Vec<T>,
}

/// A raster shared between the projector that writes it and the projectors
/// or display code that read it.
pub type SharedRaster<T> = Arc<RwLock<Raster<T>>>;

/// Wraps `raster` for sharing between projectors.
pub fn shared<T>(raster: Raster<T>) -> SharedRaster<T> {
  Arc::new(RwLock::new(raster))
}

impl<T: Clone> Raster<T> {
  /// Creates a `width` x `height` raster with every pixel set to `value`.
  pub fn new(width: usize, height: usize, value: T) -> Self {
    Self {
      width,
      height,
      pixels: vec![value; width * height],
    }
  }

  /// Sets every pixel to `value`.
  pub fn fill(&mut self, value: T) {
    self.pixels.fill(value);
  }
}

impl<T> Raster<T> {
  /// Wraps an existing row-major pixel buffer.
  pub fn from_pixels(width: usize, height: usize, pixels: Vec<T>) -> Result<Self, RasterError> {
    let expected = width * height;
    if pixels.len() != expected {
      return Err(RasterError::LengthMismatch {
        width,
        height,
        expected,
        actual: pixels.len(),
      });
    }
    Ok(Self {
      width,
      height,
      pixels,
    })
  }

  #[inline]
  pub fn width(&self) -> usize {
    self.width
  }

  #[inline]
  pub fn height(&self) -> usize {
    self.height
  }

  #[inline]
  pub fn dimensions(&self) -> (usize, usize) {
    (self.width, self.height)
  }

  /// The number of pixels, `width * height`.
  #[inline]
  pub fn len(&self) -> usize {
    self.pixels.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.pixels.is_empty()
  }

  #[inline]
  pub fn pixels(&self) -> &[T] {
    &self.pixels
  }

  #[inline]
  pub fn pixels_mut(&mut self) -> &mut [T] {
    &mut self.pixels
  }

  /// The flat index of the first pixel in row `y`.
  #[inline]
  pub fn row_offset(&self, y: usize) -> usize {
    y * self.width
  }

  pub fn into_pixels(self) -> Vec<T> {
    self.pixels
  }
}
