//! A concurrent cache for data that is still loading.
//!
//! Values stored in a [`VolatileCache`] report whether they are finished
//! ([`VolatileValue::is_valid`]). The cache treats the two states differently:
//!
//! - **Placeholders** are cheap to recreate. Their slot holds the entry only
//!   weakly, so it disappears the moment no renderer or loader still uses it.
//! - **Finished values** are expensive to recreate. Their slot owns the entry
//!   until the configured pressure budget is exceeded, at which point the
//!   oldest ones are demoted back to weak slots.
//!
//! Entries announce their own reclamation on a notice channel. The render loop
//! calls [`VolatileCache::finalize_reclaimed`] once per frame to sweep a
//! bounded batch of dead slots.
//!
//! Background loaders turn placeholders into finished values through
//! [`VolatileEntry::load_if_not_valid`], which runs each entry's loader
//! exactly once no matter how many threads ask.

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod metrics;

// Internal, crate-only modules
mod cache;
mod entry;
mod loader;
mod pressure;
mod shared;
mod store;
mod value;

// Re-export the primary user-facing types for convenience
pub use builder::{VolatileCacheBuilder, DEFAULT_FINALIZE_BATCH};
pub use cache::VolatileCache;
pub use entry::{EntryHandle, VolatileEntry, LOADED, NEVER_ENQUEUED};
pub use error::{BuildError, LoadError};
pub use loader::VolatileLoader;
pub use metrics::MetricsSnapshot;
pub use value::{Volatile, VolatileValue};
