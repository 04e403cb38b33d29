use crate::array::{check_position, RandomAccess};
use crate::cell::Element;
use crate::error::CellError;
use crate::grid::CellInterval;

/// Fully materialized array, first axis fastest
#[derive(Debug, Clone, PartialEq)]
pub struct DenseArray<T> {
    dimensions: Vec<u64>,
    data: Vec<T>,
}

impl<T: Element> DenseArray<T> {
    pub fn new(dimensions: impl Into<Vec<u64>>, data: Vec<T>) -> Result<Self, CellError> {
        let dimensions = dimensions.into();
        let expected = dimensions.iter().product::<u64>() as usize;
        if data.len() != expected {
            return Err(CellError::DimensionMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dimensions, data })
    }

    /// Array with every element computed from its position
    pub fn from_fn<F>(dimensions: impl Into<Vec<u64>>, f: F) -> Self
    where
        F: Fn(&[u64]) -> T,
    {
        let dimensions = dimensions.into();
        let data = if dimensions.is_empty() || dimensions.contains(&0) {
            Vec::new()
        } else {
            let max = dimensions.iter().map(|d| d - 1).collect();
            CellInterval::new(vec![0; dimensions.len()], max)
                .positions()
                .map(|position| f(&position))
                .collect()
        };
        Self { dimensions, data }
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    fn offset_of(&self, position: &[u64]) -> usize {
        let mut offset = 0u64;
        let mut stride = 1u64;
        for (p, dim) in position.iter().zip(&self.dimensions) {
            offset += p * stride;
            stride *= dim;
        }
        offset as usize
    }
}

impl<T: Element> RandomAccess<T> for DenseArray<T> {
    fn dimensions(&self) -> &[u64] {
        &self.dimensions
    }

    fn read(&self, position: &[u64]) -> Result<T, CellError> {
        check_position(&self.dimensions, position)?;
        Ok(self.data[self.offset_of(position)])
    }
}
