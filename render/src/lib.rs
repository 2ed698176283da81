//! Projectors that turn progressively loaded data into rendered rasters.
//!
//! A [`Projector`] renders one frame into a target raster and reports whether
//! the frame was drawn entirely from finished data. Leaf projectors such as
//! [`EntryProjector`] draw whatever a [`tessella_cache::VolatileCache`]
//! currently holds; the [`AccumulateProjector`] composite blends the rasters of
//! several children on a worker pool.
//!
//! A renderer typically maps the root projector once per frame, and keeps
//! mapping it on later frames until [`Projector::is_valid`] reports that every
//! tile has finished loading. [`Projector::cancel`] aborts a frame in flight,
//! for example when the view changes.

pub mod accumulate;
pub mod argb;
pub mod error;
pub mod leaf;
pub mod partition;
pub mod pool;
pub mod projector;
pub mod raster;

pub use accumulate::{AccumulateProjector, Accumulator};
pub use argb::ArgbSum;
pub use error::{ProjectorError, RasterError};
pub use leaf::{EntryProjector, TilePixels};
pub use partition::{partition_count, partitions};
pub use pool::WorkerPool;
pub use projector::Projector;
pub use raster::{shared, Raster, SharedRaster};
