use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tessella_cache::{LoadError, Volatile, VolatileCacheBuilder, VolatileLoader};
use tracing_subscriber::EnvFilter;

type Tile = Volatile<Vec<u32>>;

const TILE_PIXELS: usize = 256 * 256;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
    .init();

  // Room for four finished tiles before the oldest are handed back.
  let cache = VolatileCacheBuilder::<(u32, u32), Tile>::default()
    .pressure_budget(4)
    .finalize_batch(64)
    .build()
    .expect("Failed to build cache");

  let loader: Arc<dyn VolatileLoader<(u32, u32), Tile>> = Arc::new(|&(x, y): &(u32, u32)| -> Result<Tile, LoadError> {
    // Pretend to decode the tile from disk.
    thread::sleep(Duration::from_millis(5));
    Ok(Volatile::ready(vec![0xFF00_0000 | (x << 8) | y; TILE_PIXELS]))
  });

  // The renderer asks for a 3x3 block of tiles. Each starts as a grey
  // placeholder that can be drawn right away.
  let mut visible = Vec::new();
  for x in 0..3 {
    for y in 0..3 {
      let placeholder = Volatile::placeholder(vec![0xFF80_8080; TILE_PIXELS]);
      visible.push(cache.put_shared((x, y), placeholder, loader.clone()));
    }
  }
  println!("Installed {} placeholders.", cache.len());

  // Background workers finish the tiles.
  let workers: Vec<_> = visible
    .chunks(3)
    .map(|chunk| {
      let chunk = chunk.to_vec();
      thread::spawn(move || {
        for entry in chunk {
          if let Err(err) = entry.load_if_not_valid() {
            eprintln!("tile {:?} failed: {}", entry.key(), err);
          }
        }
      })
    })
    .collect();
  for worker in workers {
    worker.join().expect("loader thread panicked");
  }

  // The view moves on and drops its handles. Only the tiles that still fit
  // the budget stay in memory.
  drop(visible);
  let swept = cache.finalize_reclaimed();
  println!("Finalized {} reclaimed tiles, {} remain.", swept, cache.len());

  for x in 0..3 {
    for y in 0..3 {
      let state = match cache.get(&(x, y)) {
        Some(entry) if entry.is_valid() => "cached",
        Some(_) => "placeholder",
        None => "gone",
      };
      println!("tile ({}, {}): {}", x, y, state);
    }
  }

  println!("\nCache metrics: {:#?}", cache.metrics());
}
