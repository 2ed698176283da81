use crate::error::ProjectorError;

use std::fmt;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// The threads a composite projector renders its partitions on.
#[derive(Clone)]
pub enum WorkerPool {
  /// A long-lived pool owned by the caller and reused across frames.
  Shared(Arc<ThreadPool>),
  /// A pool of `threads` workers created for a single `map` call and torn
  /// down when the frame is done.
  Transient { threads: usize },
}

impl WorkerPool {
  /// A transient pool with one worker per logical CPU.
  pub fn per_frame() -> Self {
    WorkerPool::Transient {
      threads: num_cpus::get().max(1),
    }
  }

  pub fn transient(threads: usize) -> Result<Self, ProjectorError> {
    if threads == 0 {
      return Err(ProjectorError::ZeroWorkers);
    }
    Ok(WorkerPool::Transient { threads })
  }

  pub fn shared(pool: Arc<ThreadPool>) -> Self {
    WorkerPool::Shared(pool)
  }

  /// The number of workers partitions are spread over.
  pub fn threads(&self) -> usize {
    match self {
      WorkerPool::Shared(pool) => pool.current_num_threads(),
      WorkerPool::Transient { threads } => *threads,
    }
  }

  /// Runs `op` inside the pool, building it first if it is transient.
  pub(crate) fn install<R, F>(&self, op: F) -> Result<R, ThreadPoolBuildError>
  where
    F: FnOnce(&ThreadPool) -> R,
  {
    match self {
      WorkerPool::Shared(pool) => Ok(op(pool)),
      WorkerPool::Transient { threads } => {
        let pool = ThreadPoolBuilder::new()
          .num_threads(*threads)
          .thread_name(|i| format!("tessella-render-{}", i))
          .build()?;
        Ok(op(&pool))
      }
    }
  }
}

impl Default for WorkerPool {
  fn default() -> Self {
    Self::per_frame()
  }
}

impl fmt::Debug for WorkerPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      WorkerPool::Shared(pool) => f
        .debug_struct("Shared")
        .field("threads", &pool.current_num_threads())
        .finish(),
      WorkerPool::Transient { threads } => f.debug_struct("Transient").field("threads", threads).finish(),
    }
  }
}
