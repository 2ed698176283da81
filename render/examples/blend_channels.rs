use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tessella_cache::{LoadError, Volatile, VolatileCacheBuilder, VolatileLoader};
use tessella_render::argb::argb;
use tessella_render::{shared, AccumulateProjector, ArgbSum, EntryProjector, Projector, Raster, WorkerPool};
use tracing_subscriber::EnvFilter;

const SIZE: usize = 64;

type Tile = Volatile<Vec<u32>>;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace")))
    .init();

  let cache = VolatileCacheBuilder::<&'static str, Tile>::default()
    .build()
    .expect("Failed to build cache");

  // Two color channels of the same image, each loading at its own pace.
  let channel = |color: u32, delay: u64| -> Arc<dyn VolatileLoader<&'static str, Tile>> {
    Arc::new(move |_: &&'static str| -> Result<Tile, LoadError> {
      thread::sleep(Duration::from_millis(delay));
      Ok(Volatile::ready(vec![color; SIZE * SIZE]))
    })
  };
  let grey = || Volatile::placeholder(vec![argb(255, 32, 32, 32); SIZE * SIZE]);
  let red = cache.put_shared("red", grey(), channel(argb(255, 200, 0, 0), 30));
  let green = cache.put_shared("green", grey(), channel(argb(255, 0, 180, 0), 90));

  let red_out = shared(Raster::new(SIZE, SIZE, 0));
  let green_out = shared(Raster::new(SIZE, SIZE, 0));
  let screen = shared(Raster::new(SIZE, SIZE, 0));
  let root = AccumulateProjector::new(
    vec![
      Box::new(EntryProjector::new(cache.clone(), "red", red_out.clone(), 0)) as Box<dyn Projector>,
      Box::new(EntryProjector::new(cache.clone(), "green", green_out.clone(), 0)),
    ],
    vec![red_out, green_out],
    ArgbSum,
    screen.clone(),
    WorkerPool::transient(4).expect("at least one worker"),
  )
  .expect("sources match the screen");

  let loaders: Vec<_> = [red, green]
    .into_iter()
    .map(|entry| thread::spawn(move || entry.load_if_not_valid()))
    .collect();

  // The render loop: draw whatever is there, until every channel is done.
  let mut frame = 0;
  loop {
    frame += 1;
    root.map(true);
    cache.finalize_reclaimed();
    let pixel = screen.read().pixels()[0];
    println!(
      "frame {:>2}: valid={} center=#{:08X} took {:?}",
      frame,
      root.is_valid(),
      pixel,
      root.last_frame_render_time().unwrap_or_default()
    );
    if root.is_valid() {
      break;
    }
    thread::sleep(Duration::from_millis(16));
  }

  for loader in loaders {
    if let Err(err) = loader.join().expect("loader thread panicked") {
      eprintln!("load failed: {}", err);
    }
  }
}
