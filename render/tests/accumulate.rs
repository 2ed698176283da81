mod common;

use common::{boxed, target, StubProjector, HEIGHT, WIDTH};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;

use pretty_assertions::assert_eq;
use tessella_render::{
  shared, AccumulateProjector, ArgbSum, Projector, ProjectorError, Raster, SharedRaster, WorkerPool,
};

fn single_thread_pool() -> WorkerPool {
  WorkerPool::shared(Arc::new(rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap()))
}

/// Takes the last source that has anything to show.
fn topmost(sources: &[&u32], target: &mut u32) {
  *target = sources.iter().rev().map(|&&p| p).find(|&p| p != 0).unwrap_or(0);
}

fn counting(calls: Arc<AtomicUsize>) -> impl Fn(&[&u32], &mut u32) + Send + Sync + 'static {
  move |sources: &[&u32], target: &mut u32| {
    calls.fetch_add(1, Ordering::SeqCst);
    topmost(sources, target);
  }
}

fn two_children(
  a: &Arc<StubProjector>,
  b: &Arc<StubProjector>,
) -> (Vec<Box<dyn Projector>>, Vec<SharedRaster<u32>>) {
  (vec![boxed(a), boxed(b)], vec![a.raster(), b.raster()])
}

#[test]
fn test_valid_source_shows_through_empty_placeholder() {
  let a = Arc::new(StubProjector::finished(vec![1, 1, 1, 1]));
  let b = Arc::new(StubProjector::loading(vec![0, 0, 0, 0]));
  let (children, sources) = two_children(&a, &b);
  let out = target();
  let projector =
    AccumulateProjector::new(children, sources, topmost, out.clone(), WorkerPool::transient(2).unwrap()).unwrap();

  assert!(projector.map(true));
  assert_eq!(out.read().pixels(), &[1, 1, 1, 1]);
  assert!(!projector.is_valid());
  // Only the child that was not yet valid gets mapped.
  assert_eq!(a.maps(), 0);
  assert_eq!(b.maps(), 1);
}

#[test]
fn test_sources_arrive_in_order() {
  let a = Arc::new(StubProjector::finished(vec![1, 2, 3, 4]));
  let b = Arc::new(StubProjector::finished(vec![5, 6, 7, 8]));
  let (children, sources) = two_children(&a, &b);
  let out = target();
  let projector = AccumulateProjector::new(
    children,
    sources,
    |sources: &[&u32], target: &mut u32| *target = *sources[0] * 10 + *sources[1],
    out.clone(),
    WorkerPool::transient(1).unwrap(),
  )
  .unwrap();

  assert!(projector.map_default());
  assert_eq!(out.read().pixels(), &[15, 26, 37, 48]);
  assert!(projector.is_valid());
}

#[test]
fn test_cancel_before_partitions_skips_accumulation() {
  type Root = AccumulateProjector<u32, u32>;
  let parent: Arc<OnceLock<Weak<Root>>> = Arc::new(OnceLock::new());
  let calls = Arc::new(AtomicUsize::new(0));

  let a = Arc::new(StubProjector::finished(vec![1, 1, 1, 1]));
  let b = Arc::new(StubProjector::loading(vec![2, 2, 2, 2]).with_hook({
    let parent = parent.clone();
    move || {
      if let Some(root) = parent.get().and_then(Weak::upgrade) {
        root.cancel();
      }
    }
  }));
  let (children, sources) = two_children(&a, &b);
  let out = target();
  let root = Arc::new(
    Root::new(children, sources, counting(calls.clone()), out.clone(), WorkerPool::transient(2).unwrap()).unwrap(),
  );
  parent.set(Arc::downgrade(&root)).unwrap();

  assert!(!root.map(true));
  assert_eq!(calls.load(Ordering::SeqCst), 0, "combiner must never run");
  assert_eq!(out.read().pixels(), &[0xDEAD; 4]);
  assert!(!root.is_valid());
  // The cancel reached the children too.
  assert_eq!(a.cancels(), 1);
  assert_eq!(b.cancels(), 1);
}

#[test]
fn test_cancel_mid_frame_finishes_running_partition_only() {
  type Root = AccumulateProjector<u32, u32>;
  let (width, height) = (5, 20);
  let parent: Arc<OnceLock<Weak<Root>>> = Arc::new(OnceLock::new());
  let calls = Arc::new(AtomicUsize::new(0));

  let a = Arc::new(StubProjector::sized(width, height, vec![1; width * height], true));
  let b = Arc::new(StubProjector::sized(width, height, vec![2; width * height], true));
  let (children, sources) = two_children(&a, &b);
  let out = shared(Raster::new(width, height, 0u32));
  let combiner = {
    let parent = parent.clone();
    let calls = calls.clone();
    move |sources: &[&u32], target: &mut u32| {
      if calls.fetch_add(1, Ordering::SeqCst) == 0 {
        if let Some(root) = parent.get().and_then(Weak::upgrade) {
          root.cancel();
        }
      }
      topmost(sources, target);
    }
  };
  let root = Arc::new(Root::new(children, sources, combiner, out.clone(), single_thread_pool()).unwrap());
  parent.set(Arc::downgrade(&root)).unwrap();

  // One worker gives ten partitions of two rows, run one after another.
  assert!(!root.map(true));
  assert_eq!(calls.load(Ordering::SeqCst), 2 * width, "only the running partition completes");
  assert!(!root.is_valid());
  let touched = out.read().pixels().iter().filter(|&&p| p == 2).count();
  assert_eq!(touched, 2 * width);
}

#[test]
fn test_repeated_source_with_concurrent_writer() {
  let stub = Arc::new(StubProjector::finished(vec![3, 3, 3, 3]));
  let src = stub.raster();
  let out = target();
  let projector = AccumulateProjector::new(
    vec![boxed(&stub), boxed(&stub)],
    vec![src.clone(), src.clone()],
    |sources: &[&u32], target: &mut u32| *target = *sources[0] + *sources[1],
    out.clone(),
    single_thread_pool(),
  )
  .unwrap();

  assert!(projector.map(true));
  assert_eq!(out.read().pixels(), &[6, 6, 6, 6]);

  let stop = Arc::new(AtomicBool::new(false));
  let writer = {
    let src = src.clone();
    let stop = stop.clone();
    thread::spawn(move || {
      let mut value = 0u32;
      while !stop.load(Ordering::Relaxed) {
        src.write().fill(value);
        value = value.wrapping_add(1);
      }
    })
  };

  for _ in 0..200 {
    assert!(projector.map(true));
    // Both slots see the same snapshot of the source.
    assert!(out.read().pixels().iter().all(|p| p % 2 == 0));
  }
  stop.store(true, Ordering::Relaxed);
  writer.join().unwrap();
  assert!(projector.is_valid());
}

#[test]
fn test_cancelled_child_short_circuits() {
  let calls = Arc::new(AtomicUsize::new(0));
  let a = Arc::new(StubProjector::loading(vec![1, 1, 1, 1]).cancelled_on_map());
  let b = Arc::new(StubProjector::loading(vec![2, 2, 2, 2]));
  let (children, sources) = two_children(&a, &b);
  let projector = AccumulateProjector::new(
    children,
    sources,
    counting(calls.clone()),
    target(),
    WorkerPool::transient(2).unwrap(),
  )
  .unwrap();

  assert!(!projector.map(true));
  assert_eq!(a.maps(), 1);
  assert_eq!(b.maps(), 0, "children after a cancelled one are not mapped");
  assert_eq!(calls.load(Ordering::SeqCst), 0);
  assert!(!projector.is_valid());
}

#[test]
fn test_cancel_is_idempotent_and_recursive() {
  let a = Arc::new(StubProjector::finished(vec![1, 1, 1, 1]));
  let b = Arc::new(StubProjector::finished(vec![2, 2, 2, 2]));
  let (children, sources) = two_children(&a, &b);
  let projector =
    AccumulateProjector::new(children, sources, topmost, target(), WorkerPool::transient(1).unwrap()).unwrap();

  projector.cancel();
  projector.cancel();
  assert_eq!(a.cancels(), 2);
  assert_eq!(b.cancels(), 2);

  // A new frame starts with a fresh cancel flag.
  assert!(projector.map(true));
  assert!(projector.is_valid());
}

#[test]
fn test_blends_again_on_every_frame() {
  let calls = Arc::new(AtomicUsize::new(0));
  let a = Arc::new(StubProjector::finished(vec![1, 1, 1, 1]));
  let b = Arc::new(StubProjector::loading(vec![0, 3, 0, 3]).becomes_valid());
  let (children, sources) = two_children(&a, &b);
  let out = target();
  let projector = AccumulateProjector::new(
    children,
    sources,
    counting(calls.clone()),
    out.clone(),
    WorkerPool::transient(2).unwrap(),
  )
  .unwrap();

  assert!(projector.map(true));
  assert!(projector.is_valid());
  assert_eq!(out.read().pixels(), &[1, 3, 1, 3]);

  // Nobody changed anything, but the target is recomputed anyway.
  out.write().fill(0);
  assert!(projector.map(true));
  assert_eq!(out.read().pixels(), &[1, 3, 1, 3]);
  assert_eq!(calls.load(Ordering::SeqCst), 2 * WIDTH * HEIGHT);
  assert_eq!(b.maps(), 1, "valid children are not mapped again");
}

#[test]
fn test_shared_and_transient_pools_agree() {
  let (width, height) = (16, 9);
  let red: Vec<u32> = (0..width * height).map(|i| 0xFF00_0000 | ((i as u32 % 256) << 16)).collect();
  let blue: Vec<u32> = (0..width * height).map(|i| 0xFF00_0000 | (255 - i as u32 % 256)).collect();

  let render = |pool: WorkerPool| {
    let a = Arc::new(StubProjector::sized(width, height, red.clone(), true));
    let b = Arc::new(StubProjector::sized(width, height, blue.clone(), true));
    let (children, sources) = two_children(&a, &b);
    let out = shared(Raster::new(width, height, 0u32));
    let projector = AccumulateProjector::new(children, sources, ArgbSum, out.clone(), pool).unwrap();
    assert!(projector.map(true));
    let pixels = out.read().pixels().to_vec();
    pixels
  };

  let pool = rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap();
  let shared_pool = WorkerPool::shared(Arc::new(pool));
  assert_eq!(shared_pool.threads(), 3);

  let with_shared = render(shared_pool.clone());
  // The shared pool survives the frame and can be reused.
  let again = render(shared_pool);
  let with_transient = render(WorkerPool::transient(5).unwrap());

  assert_eq!(with_shared, with_transient);
  assert_eq!(with_shared, again);
  assert_eq!(with_shared[0], 0xFF00_00FF);
  assert_eq!(with_shared[10], 0xFF0A_00F5);
}

#[test]
fn test_frame_time_is_recorded() {
  let a = Arc::new(StubProjector::finished(vec![1, 1, 1, 1]));
  let b = Arc::new(StubProjector::finished(vec![2, 2, 2, 2]));
  let (children, sources) = two_children(&a, &b);
  let projector =
    AccumulateProjector::new(children, sources, topmost, target(), WorkerPool::transient(1).unwrap()).unwrap();

  assert_eq!(projector.last_frame_render_time(), None);
  assert!(projector.map(true));
  assert!(projector.last_frame_render_time().is_some());
}

#[test]
fn test_composites_nest() {
  let a = Arc::new(StubProjector::finished(vec![1, 0, 0, 0]));
  let b = Arc::new(StubProjector::loading(vec![0, 2, 0, 0]).becomes_valid());
  let c = Arc::new(StubProjector::finished(vec![0, 0, 3, 0]));

  let (children, sources) = two_children(&a, &b);
  let inner_out = target();
  let inner = AccumulateProjector::new(
    children,
    sources,
    topmost,
    inner_out.clone(),
    WorkerPool::transient(1).unwrap(),
  )
  .unwrap();

  let inner: Box<dyn Projector> = Box::new(inner);
  let out = target();
  let root = AccumulateProjector::new(
    vec![inner, boxed(&c)],
    vec![inner_out, c.raster()],
    topmost,
    out.clone(),
    WorkerPool::transient(2).unwrap(),
  )
  .unwrap();

  assert!(root.map(true));
  assert!(root.is_valid());
  assert_eq!(out.read().pixels(), &[1, 2, 3, 0]);
}

#[test]
fn test_rejects_mismatched_children() {
  let a = Arc::new(StubProjector::finished(vec![1, 1, 1, 1]));
  let err = AccumulateProjector::new(
    vec![boxed(&a)],
    vec![a.raster(), a.raster()],
    topmost,
    target(),
    WorkerPool::transient(1).unwrap(),
  )
  .unwrap_err();
  assert_eq!(err, ProjectorError::SourceCountMismatch { children: 1, sources: 2 });
}

#[test]
fn test_rejects_mismatched_dimensions() {
  let a = Arc::new(StubProjector::sized(3, 1, vec![1, 1, 1], true));
  let err = AccumulateProjector::new(
    vec![boxed(&a)],
    vec![a.raster()],
    topmost,
    target(),
    WorkerPool::transient(1).unwrap(),
  )
  .unwrap_err();
  assert_eq!(
    err,
    ProjectorError::DimensionMismatch {
      index: 0,
      source_width: 3,
      source_height: 1,
      target_width: WIDTH,
      target_height: HEIGHT,
    }
  );
}

#[test]
fn test_rejects_target_as_source() {
  let a = Arc::new(StubProjector::finished(vec![1, 1, 1, 1]));
  let err = AccumulateProjector::new(
    vec![boxed(&a)],
    vec![a.raster()],
    topmost,
    a.raster(),
    WorkerPool::transient(1).unwrap(),
  )
  .unwrap_err();
  assert_eq!(err, ProjectorError::SourceAliasesTarget { index: 0 });
}

#[test]
fn test_rejects_empty_pool() {
  let err = AccumulateProjector::<u32, u32>::new(
    Vec::new(),
    Vec::new(),
    topmost,
    target(),
    WorkerPool::Transient { threads: 0 },
  )
  .unwrap_err();
  assert_eq!(err, ProjectorError::ZeroWorkers);
}
