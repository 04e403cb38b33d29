use crate::array::source::SourceLoader;
use crate::array::volatile::VolatileArray;
use crate::array::{check_dest, RandomAccess};
use crate::cache::store::CellStore;
use crate::cache::CacheStats;
use crate::cell::{Cell, CellLoader, Element};
use crate::config::CacheConfig;
use crate::error::CellError;
use crate::fetch::FetchQueue;
use crate::grid::{CellCoord, CellInterval, GridSpec};
use std::sync::Arc;

/// An n-dimensional array whose cells are computed on first access and
/// cached in a shared [`CellStore`].
///
/// Element reads block while the owning cell is loaded. Cloning the view is
/// cheap and shares the store.
pub struct LazyArray<T: Element> {
    store: Arc<CellStore<T>>,
}

impl<T: Element> Clone for LazyArray<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<T: Element> LazyArray<T> {
    pub fn new<L>(grid: GridSpec, loader: L, config: CacheConfig) -> Self
    where
        L: CellLoader<T>,
    {
        Self::from_store(Arc::new(CellStore::new(grid, loader, config)))
    }

    /// Lazily computed array backed by a loader closure
    pub fn generate<F>(grid: GridSpec, loader: F, config: CacheConfig) -> Self
    where
        F: Fn(&CellCoord, &CellInterval, &mut [T]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(grid, loader, config)
    }

    /// Cache an arbitrary source cell by cell
    pub fn cache<S>(
        source: Arc<S>,
        cell_dimensions: impl Into<Vec<u32>>,
        config: CacheConfig,
    ) -> Result<Self, CellError>
    where
        S: RandomAccess<T>,
    {
        let grid = GridSpec::new(source.dimensions().to_vec(), cell_dimensions)?;
        Ok(Self::new(grid, SourceLoader::new(source), config))
    }

    /// Another view onto an existing store
    pub fn from_store(store: Arc<CellStore<T>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<CellStore<T>> {
        &self.store
    }

    pub fn grid(&self) -> &GridSpec {
        self.store.grid()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub fn cell(&self, coord: &CellCoord) -> Result<Arc<Cell<T>>, CellError> {
        self.store.get(coord)
    }

    /// Every cell of the grid in linear index order, loading as it goes
    pub fn cells(&self) -> impl Iterator<Item = Result<Arc<Cell<T>>, CellError>> + '_ {
        (0..self.grid().num_cells()).map(move |index| {
            let coord = self.grid().coord_of_index(index)?;
            self.store.get(&coord)
        })
    }

    /// Non-blocking view onto the same store
    pub fn volatile(&self, queue: Arc<FetchQueue>) -> VolatileArray<T> {
        VolatileArray::new(self.clone(), queue)
    }
}

impl<T: Element> RandomAccess<T> for LazyArray<T> {
    fn dimensions(&self) -> &[u64] {
        self.grid().array_dimensions()
    }

    fn read(&self, position: &[u64]) -> Result<T, CellError> {
        let coord = self.grid().cell_coord_of(position)?;
        let cell = self.store.get(&coord)?;
        cell.get(position).ok_or_else(|| CellError::OutOfBounds {
            position: position.to_vec(),
            dimensions: cell.interval().max().to_vec(),
        })
    }

    /// Copies cell by cell. Each cell is fetched independently, so the
    /// result is not a consistent snapshot across cells.
    fn read_interval(&self, interval: &CellInterval, dest: &mut [T]) -> Result<(), CellError> {
        check_dest(interval, dest)?;
        for coord in self.grid().cells_overlapping(interval)? {
            let cell = self.store.get(&coord)?;
            let Some(overlap) = cell.interval().intersect(interval) else {
                continue;
            };
            for position in overlap.positions() {
                if let (Some(offset), Some(value)) =
                    (interval.offset_of(&position), cell.get(&position))
                {
                    dest[offset] = value;
                }
            }
        }
        Ok(())
    }
}
