//! # lazy-cells
//!
//! **Chunked lazy caching for n-dimensional arrays**
//!
//! Large arrays are often too big, or too expensive, to materialize in
//! memory at once, while consumers still need random access to arbitrary
//! regions. `lazy-cells` partitions a virtual array into fixed-size cells,
//! computes each cell on demand exactly once through a pluggable loader, and
//! serves the result back as an ordinary random-access array.
//!
//! ## Quick Start
//!
//! ```rust
//! use lazy_cells::{CacheConfig, CellCoord, CellInterval, GridSpec, LazyArray, RandomAccess};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // An 8x8 array split into four 4x4 cells
//! let grid = GridSpec::new(vec![8, 8], vec![4, 4])?;
//! let index_grid = grid.clone();
//!
//! // Fill every cell with its own linear index
//! let array = LazyArray::generate(
//!     grid,
//!     move |coord: &CellCoord, _: &CellInterval, data: &mut [u64]| {
//!         data.fill(index_grid.linear_index(coord)?);
//!         Ok(())
//!     },
//!     CacheConfig::default(),
//! );
//!
//! assert_eq!(array.read(&[5, 5])?, 3);
//! assert_eq!(array.stats().loads, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Non-blocking reads
//!
//! ```rust
//! use lazy_cells::{CacheConfig, DenseArray, FetchConfig, FetchQueue, LazyArray};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Arc::new(DenseArray::from_fn(vec![64, 64], |p| (p[0] + p[1]) as f32));
//! let cached = LazyArray::cache(source, vec![16, 16], CacheConfig::default())?;
//!
//! let queue = Arc::new(FetchQueue::new(FetchConfig::default())?);
//! let volatile = cached.volatile(queue);
//!
//! // Returns immediately; the cell loads in the background
//! let value = volatile.try_read(&[3, 4])?;
//! if let Some(v) = value.get() {
//!     assert_eq!(v, 7.0);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Features
//!
//! - **Grid Index**: coordinate math between array positions, cells and
//!   clipped boundary cells
//! - **Cell Store**: at-most-once loading per cell under concurrent callers,
//!   with soft or strong retention of released cells
//! - **Lazy Array View**: blocking element and range reads
//! - **Volatile View**: never-blocking reads backed by a bounded fetch queue
//! - **Pipelines**: any lazy array can be the source of another

pub mod array;
pub mod cache;
pub mod cell;
pub mod config;
pub mod error;
pub mod fetch;
pub mod grid;
mod metrics;

// Re-export commonly used types
pub use array::dense::DenseArray;
pub use array::lazy::LazyArray;
pub use array::source::SourceLoader;
pub use array::volatile::VolatileArray;
pub use array::{RandomAccess, Volatile};
pub use cache::store::CellStore;
pub use cache::CacheStats;
pub use cell::{Cell, CellLoader, Element};
pub use config::{CacheConfig, EvictionPolicy, FetchConfig};
pub use error::CellError;
pub use fetch::FetchQueue;
pub use grid::{CellCoord, CellInterval, GridSpec, IntervalIter};
