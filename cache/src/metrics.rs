use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the cache.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Lookups ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Throughput ---
  pub(crate) puts: CachePadded<AtomicU64>,
  pub(crate) loads: CachePadded<AtomicU64>,
  pub(crate) load_failures: CachePadded<AtomicU64>,
  pub(crate) interrupted_loads: CachePadded<AtomicU64>,

  // --- Tier movement ---
  pub(crate) upgrades: CachePadded<AtomicU64>,
  pub(crate) demotions: CachePadded<AtomicU64>,

  // --- Reclamation ---
  pub(crate) reclaimed: CachePadded<AtomicU64>,
  pub(crate) stale_notices: CachePadded<AtomicU64>,
  pub(crate) clears: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      puts: CachePadded::new(AtomicU64::new(0)),
      loads: CachePadded::new(AtomicU64::new(0)),
      load_failures: CachePadded::new(AtomicU64::new(0)),
      interrupted_loads: CachePadded::new(AtomicU64::new(0)),
      upgrades: CachePadded::new(AtomicU64::new(0)),
      demotions: CachePadded::new(AtomicU64::new(0)),
      reclaimed: CachePadded::new(AtomicU64::new(0)),
      stale_notices: CachePadded::new(AtomicU64::new(0)),
      clears: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current metrics.
  ///
  /// `pressure_weight` is passed in because it lives under the cache's
  /// mutation lock rather than in an atomic.
  pub(crate) fn snapshot(&self, pressure_weight: u64) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      puts: self.puts.load(Ordering::Relaxed),
      loads: self.loads.load(Ordering::Relaxed),
      load_failures: self.load_failures.load(Ordering::Relaxed),
      interrupted_loads: self.interrupted_loads.load(Ordering::Relaxed),
      upgrades: self.upgrades.load(Ordering::Relaxed),
      demotions: self.demotions.load(Ordering::Relaxed),
      reclaimed: self.reclaimed.load(Ordering::Relaxed),
      stale_notices: self.stale_notices.load(Ordering::Relaxed),
      clears: self.clears.load(Ordering::Relaxed),
      pressure_weight,
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cache's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Lookups that found a live entry.
  pub hits: u64,
  /// Lookups that found nothing, or only a slot whose entry is gone.
  pub misses: u64,
  /// The cache hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// The number of entries created through `put`.
  pub puts: u64,
  /// Successful loader invocations.
  pub loads: u64,
  /// Loader invocations that failed with a fault.
  pub load_failures: u64,
  /// Loader invocations that were interrupted.
  pub interrupted_loads: u64,
  /// Entries moved to the pressure-tolerant tier after loading.
  pub upgrades: u64,
  /// Pressure slots demoted because the budget was exceeded.
  pub demotions: u64,
  /// Slots removed by finalize.
  pub reclaimed: u64,
  /// Reclamation notices whose slot had already been replaced.
  pub stale_notices: u64,
  /// The number of `clear` calls.
  pub clears: u64,
  /// The weight currently charged to the pressure tier.
  pub pressure_weight: u64,
  /// The number of seconds the cache has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("puts", &self.puts)
      .field("loads", &self.loads)
      .field("load_failures", &self.load_failures)
      .field("interrupted_loads", &self.interrupted_loads)
      .field("upgrades", &self.upgrades)
      .field("demotions", &self.demotions)
      .field("reclaimed", &self.reclaimed)
      .field("stale_notices", &self.stale_notices)
      .field("clears", &self.clears)
      .field("pressure_weight", &self.pressure_weight)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
