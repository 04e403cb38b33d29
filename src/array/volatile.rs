use crate::array::lazy::LazyArray;
use crate::array::Volatile;
use crate::cell::{Cell, Element};
use crate::error::CellError;
use crate::fetch::FetchQueue;
use crate::grid::CellCoord;
use std::sync::Arc;

/// Non-blocking view for interactive consumers such as renderers.
///
/// A read of a cell that is not resident yet returns immediately with
/// `valid == false` and queues the load in the background; the consumer
/// polls again on its next pass.
pub struct VolatileArray<T: Element> {
    array: LazyArray<T>,
    queue: Arc<FetchQueue>,
}

impl<T: Element> Clone for VolatileArray<T> {
    fn clone(&self) -> Self {
        Self {
            array: self.array.clone(),
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<T: Element> VolatileArray<T> {
    pub fn new(array: LazyArray<T>, queue: Arc<FetchQueue>) -> Self {
        Self { array, queue }
    }

    pub fn array(&self) -> &LazyArray<T> {
        &self.array
    }

    pub fn dimensions(&self) -> &[u64] {
        self.array.grid().array_dimensions()
    }

    /// The cell if resident; otherwise schedules its load and returns `None`
    pub fn try_cell(&self, coord: &CellCoord) -> Result<Option<Arc<Cell<T>>>, CellError> {
        let store = self.array.store();
        if let Some(cell) = store.try_get(coord)? {
            return Ok(Some(cell));
        }
        self.queue.submit(Arc::clone(store), coord.clone())?;
        Ok(None)
    }

    /// Element at `position` if its cell is resident, never blocking
    pub fn try_read(&self, position: &[u64]) -> Result<Volatile<T>, CellError> {
        let coord = self.array.grid().cell_coord_of(position)?;
        Ok(match self.try_cell(&coord)? {
            Some(cell) => cell
                .get(position)
                .map_or_else(Volatile::invalid, Volatile::valid),
            None => Volatile::invalid(),
        })
    }
}
