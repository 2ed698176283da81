#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tessella_cache::{LoadError, VolatileCache, VolatileCacheBuilder, VolatileValue};

/// A tile of pixels as a renderer would see it: either placeholder data or
/// the finished tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
  pub pixels: Vec<u8>,
  pub valid: bool,
}

impl Tile {
  pub fn placeholder(len: usize) -> Self {
    Self {
      pixels: vec![0; len],
      valid: false,
    }
  }

  pub fn ready(pixels: Vec<u8>) -> Self {
    Self {
      pixels,
      valid: true,
    }
  }
}

impl VolatileValue for Tile {
  fn is_valid(&self) -> bool {
    self.valid
  }

  fn weight(&self) -> u64 {
    self.pixels.len() as u64
  }
}

pub type TileCache = VolatileCache<u32, Tile>;

pub fn build_test_cache() -> TileCache {
  VolatileCacheBuilder::default()
    .shards(4)
    .build()
    .unwrap()
}

pub fn build_test_cache_with_budget(budget: u64) -> TileCache {
  VolatileCacheBuilder::default()
    .shards(4)
    .pressure_budget(budget)
    .build()
    .unwrap()
}

/// A loader that fills a tile with its key and counts its invocations.
pub fn counting_loader(
  count: Arc<AtomicUsize>,
  len: usize,
) -> impl Fn(&u32) -> Result<Tile, LoadError> + Send + Sync + 'static {
  move |key: &u32| {
    count.fetch_add(1, Ordering::SeqCst);
    Ok(Tile::ready(vec![*key as u8; len]))
  }
}

pub fn never_called(_: &u32) -> Result<Tile, LoadError> {
  panic!("loader should not run for this entry")
}
