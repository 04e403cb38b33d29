use crate::grid::{CellCoord, CellInterval};

/// Element types a cell can hold
pub trait Element: Copy + Default + Send + Sync + 'static {}

impl<T> Element for T where T: Copy + Default + Send + Sync + 'static {}

/// A computed, immutable chunk of the virtual array
#[derive(Debug, Clone, PartialEq)]
pub struct Cell<T> {
    coord: CellCoord,
    interval: CellInterval,
    data: Vec<T>,
}

impl<T: Element> Cell<T> {
    /// Caller guarantees `data.len() == interval.num_elements()`
    pub(crate) fn new(coord: CellCoord, interval: CellInterval, data: Vec<T>) -> Self {
        debug_assert_eq!(data.len(), interval.num_elements());
        Self {
            coord,
            interval,
            data,
        }
    }

    pub fn coord(&self) -> &CellCoord {
        &self.coord
    }

    pub fn interval(&self) -> &CellInterval {
        &self.interval
    }

    /// Flat buffer, first axis fastest
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<T>()
    }

    /// Element at an array-space position, `None` if outside this cell
    pub fn get(&self, position: &[u64]) -> Option<T> {
        self.interval
            .offset_of(position)
            .map(|offset| self.data[offset])
    }
}

/// Computes the contents of one cell.
///
/// The store hands over a buffer of `interval.num_elements()` default
/// values, laid out first axis fastest. Loaders must be callable from any
/// thread and must produce the same contents for the same cell every time,
/// since evicted cells are silently recomputed.
pub trait CellLoader<T>: Send + Sync + 'static {
    fn load(
        &self,
        coord: &CellCoord,
        interval: &CellInterval,
        data: &mut [T],
    ) -> anyhow::Result<()>;
}

impl<T, F> CellLoader<T> for F
where
    F: Fn(&CellCoord, &CellInterval, &mut [T]) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn load(
        &self,
        coord: &CellCoord,
        interval: &CellInterval,
        data: &mut [T],
    ) -> anyhow::Result<()> {
        self(coord, interval, data)
    }
}
