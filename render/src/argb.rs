//! Helpers for pixels packed as `0xAARRGGBB`.

use crate::accumulate::Accumulator;

#[inline]
pub fn argb(a: u8, r: u8, g: u8, b: u8) -> u32 {
  (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

#[inline]
pub fn alpha(pixel: u32) -> u8 {
  (pixel >> 24) as u8
}

#[inline]
pub fn red(pixel: u32) -> u8 {
  (pixel >> 16) as u8
}

#[inline]
pub fn green(pixel: u32) -> u8 {
  (pixel >> 8) as u8
}

#[inline]
pub fn blue(pixel: u32) -> u8 {
  pixel as u8
}

/// Blends ARGB sources by adding them channel by channel, clamping each
/// channel at 255.
///
/// This is the usual way to overlay several independently colored channels
/// of the same image.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgbSum;

impl Accumulator<u32, u32> for ArgbSum {
  fn accumulate(&self, sources: &[&u32], target: &mut u32) {
    let (mut a, mut r, mut g, mut b) = (0u32, 0u32, 0u32, 0u32);
    for &&pixel in sources {
      a += alpha(pixel) as u32;
      r += red(pixel) as u32;
      g += green(pixel) as u32;
      b += blue(pixel) as u32;
    }
    *target = argb(
      a.min(255) as u8,
      r.min(255) as u8,
      g.min(255) as u8,
      b.min(255) as u8,
    );
  }
}
