use crate::array::RandomAccess;
use crate::cell::{CellLoader, Element};
use crate::grid::{CellCoord, CellInterval};
use std::marker::PhantomData;
use std::sync::Arc;

/// Loader that fills each cell with the source's values at the same
/// coordinates. Using a [`LazyArray`](crate::LazyArray) as the source chains
/// two cached stages.
pub struct SourceLoader<T, S> {
    source: Arc<S>,
    _element: PhantomData<fn() -> T>,
}

impl<T, S> SourceLoader<T, S>
where
    T: Element,
    S: RandomAccess<T>,
{
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            _element: PhantomData,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }
}

impl<T, S> CellLoader<T> for SourceLoader<T, S>
where
    T: Element,
    S: RandomAccess<T>,
{
    fn load(
        &self,
        _coord: &CellCoord,
        interval: &CellInterval,
        data: &mut [T],
    ) -> anyhow::Result<()> {
        self.source.read_interval(interval, data)?;
        Ok(())
    }
}
