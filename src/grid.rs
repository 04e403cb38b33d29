use crate::error::CellError;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Grid coordinate of one cell, one entry per axis
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CellCoord(Vec<u64>);

impl CellCoord {
    pub fn new(coord: impl Into<Vec<u64>>) -> Self {
        Self(coord.into())
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }
}

impl Deref for CellCoord {
    type Target = [u64];

    fn deref(&self) -> &[u64] {
        &self.0
    }
}

impl From<Vec<u64>> for CellCoord {
    fn from(coord: Vec<u64>) -> Self {
        Self(coord)
    }
}

impl<const N: usize> From<[u64; N]> for CellCoord {
    fn from(coord: [u64; N]) -> Self {
        Self(coord.to_vec())
    }
}

/// Inclusive array-space box `[min, max]` covered by a cell
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntervalBounds", into = "IntervalBounds")]
pub struct CellInterval {
    min: Vec<u64>,
    max: Vec<u64>,
}

/// Serialized form of [`CellInterval`], validated on the way in
#[derive(Serialize, Deserialize)]
struct IntervalBounds {
    min: Vec<u64>,
    max: Vec<u64>,
}

impl TryFrom<IntervalBounds> for CellInterval {
    type Error = CellError;

    fn try_from(bounds: IntervalBounds) -> Result<Self, CellError> {
        Self::from_bounds(bounds.min, bounds.max)
    }
}

impl From<CellInterval> for IntervalBounds {
    fn from(interval: CellInterval) -> Self {
        Self {
            min: interval.min,
            max: interval.max,
        }
    }
}

impl CellInterval {
    /// Caller guarantees `min.len() == max.len()` and `min[d] <= max[d]`
    pub(crate) fn new(min: Vec<u64>, max: Vec<u64>) -> Self {
        Self { min, max }
    }

    /// Box `[min, max]`, checked for equal ranks and `min <= max`
    pub fn from_bounds(min: Vec<u64>, max: Vec<u64>) -> Result<Self, CellError> {
        if min.len() != max.len() {
            return Err(CellError::DimensionMismatch {
                expected: min.len(),
                actual: max.len(),
            });
        }
        if min.is_empty() || min.iter().zip(&max).any(|(lo, hi)| lo > hi) {
            return Err(CellError::InvalidGrid(format!(
                "empty interval {min:?}..={max:?}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> &[u64] {
        &self.min
    }

    pub fn max(&self) -> &[u64] {
        &self.max
    }

    pub fn rank(&self) -> usize {
        self.min.len()
    }

    /// Extent along each axis
    pub fn dimensions(&self) -> Vec<u64> {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(lo, hi)| (hi - lo).saturating_add(1))
            .collect()
    }

    /// Saturates at `usize::MAX` for boxes too large to address
    pub fn num_elements(&self) -> usize {
        let count = self
            .dimensions()
            .iter()
            .fold(1u64, |acc, &d| acc.saturating_mul(d));
        usize::try_from(count).unwrap_or(usize::MAX)
    }

    pub fn contains(&self, position: &[u64]) -> bool {
        position.len() == self.rank()
            && position
                .iter()
                .zip(self.min.iter().zip(&self.max))
                .all(|(p, (lo, hi))| lo <= p && p <= hi)
    }

    /// Flat offset of `position` inside this box, first axis fastest
    pub fn offset_of(&self, position: &[u64]) -> Option<usize> {
        if !self.contains(position) {
            return None;
        }
        let mut offset = 0u64;
        let mut stride = 1u64;
        for d in 0..self.rank() {
            offset += (position[d] - self.min[d]) * stride;
            stride *= self.max[d] - self.min[d] + 1;
        }
        Some(offset as usize)
    }

    /// Overlap of two boxes, `None` if they are disjoint
    pub fn intersect(&self, other: &CellInterval) -> Option<CellInterval> {
        if self.rank() != other.rank() {
            return None;
        }
        let mut min = Vec::with_capacity(self.rank());
        let mut max = Vec::with_capacity(self.rank());
        for d in 0..self.rank() {
            let lo = self.min[d].max(other.min[d]);
            let hi = self.max[d].min(other.max[d]);
            if lo > hi {
                return None;
            }
            min.push(lo);
            max.push(hi);
        }
        Some(CellInterval { min, max })
    }

    pub fn positions(&self) -> IntervalIter {
        IntervalIter::new(self)
    }
}

/// Walks every position of a box in flat order (first axis fastest)
pub struct IntervalIter {
    min: Vec<u64>,
    max: Vec<u64>,
    next: Option<Vec<u64>>,
}

impl IntervalIter {
    pub fn new(interval: &CellInterval) -> Self {
        Self {
            min: interval.min.clone(),
            max: interval.max.clone(),
            next: Some(interval.min.clone()),
        }
    }
}

impl Iterator for IntervalIter {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Vec<u64>> {
        let current = self.next.take()?;
        let mut advanced = current.clone();
        for d in 0..advanced.len() {
            if advanced[d] < self.max[d] {
                advanced[d] += 1;
                self.next = Some(advanced);
                break;
            }
            advanced[d] = self.min[d];
        }
        Some(current)
    }
}

/// Partition of an n-dimensional array into equally sized cells, clipped
/// at the upper boundary of each axis.
///
/// The number of cells always fits in a `u64` and the number of elements
/// of one cell always fits in a `usize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GridShape", into = "GridShape")]
pub struct GridSpec {
    array_dimensions: Vec<u64>,
    cell_dimensions: Vec<u32>,
    grid_dimensions: Vec<u64>,
    num_cells: u64,
}

/// Serialized form of [`GridSpec`]; derived fields are recomputed
#[derive(Serialize, Deserialize)]
struct GridShape {
    array_dimensions: Vec<u64>,
    cell_dimensions: Vec<u32>,
}

impl TryFrom<GridShape> for GridSpec {
    type Error = CellError;

    fn try_from(shape: GridShape) -> Result<Self, CellError> {
        Self::new(shape.array_dimensions, shape.cell_dimensions)
    }
}

impl From<GridSpec> for GridShape {
    fn from(grid: GridSpec) -> Self {
        Self {
            array_dimensions: grid.array_dimensions,
            cell_dimensions: grid.cell_dimensions,
        }
    }
}

impl GridSpec {
    pub fn new(
        array_dimensions: impl Into<Vec<u64>>,
        cell_dimensions: impl Into<Vec<u32>>,
    ) -> Result<Self, CellError> {
        let array_dimensions = array_dimensions.into();
        let cell_dimensions = cell_dimensions.into();

        if array_dimensions.is_empty() {
            return Err(CellError::InvalidGrid("rank must be at least 1".into()));
        }
        if array_dimensions.len() != cell_dimensions.len() {
            return Err(CellError::InvalidGrid(format!(
                "array rank {} does not match cell rank {}",
                array_dimensions.len(),
                cell_dimensions.len()
            )));
        }
        if array_dimensions.contains(&0) || cell_dimensions.contains(&0) {
            return Err(CellError::InvalidGrid(
                "dimensions must be positive".into(),
            ));
        }

        let grid_dimensions: Vec<u64> = array_dimensions
            .iter()
            .zip(&cell_dimensions)
            .map(|(&a, &c)| a.div_ceil(c as u64))
            .collect();

        // Linear cell indices are cache keys and must not wrap
        let num_cells = grid_dimensions
            .iter()
            .try_fold(1u64, |acc, &g| acc.checked_mul(g))
            .ok_or_else(|| {
                CellError::InvalidGrid(format!(
                    "grid {grid_dimensions:?} has more cells than fit in u64"
                ))
            })?;
        let cell_elements = cell_dimensions
            .iter()
            .try_fold(1usize, |acc, &c| acc.checked_mul(c as usize));
        if cell_elements.is_none() {
            return Err(CellError::InvalidGrid(format!(
                "cell {cell_dimensions:?} has more elements than fit in usize"
            )));
        }

        Ok(Self {
            array_dimensions,
            cell_dimensions,
            grid_dimensions,
            num_cells,
        })
    }

    pub fn rank(&self) -> usize {
        self.array_dimensions.len()
    }

    pub fn array_dimensions(&self) -> &[u64] {
        &self.array_dimensions
    }

    pub fn cell_dimensions(&self) -> &[u32] {
        &self.cell_dimensions
    }

    pub fn grid_dimensions(&self) -> &[u64] {
        &self.grid_dimensions
    }

    pub fn num_cells(&self) -> u64 {
        self.num_cells
    }

    fn check_rank(&self, actual: usize) -> Result<(), CellError> {
        if actual != self.rank() {
            return Err(CellError::DimensionMismatch {
                expected: self.rank(),
                actual,
            });
        }
        Ok(())
    }

    fn check_position(&self, position: &[u64]) -> Result<(), CellError> {
        self.check_rank(position.len())?;
        if position
            .iter()
            .zip(&self.array_dimensions)
            .any(|(p, dim)| p >= dim)
        {
            return Err(CellError::OutOfBounds {
                position: position.to_vec(),
                dimensions: self.array_dimensions.clone(),
            });
        }
        Ok(())
    }

    fn check_coord(&self, coord: &[u64]) -> Result<(), CellError> {
        self.check_rank(coord.len())?;
        if coord
            .iter()
            .zip(&self.grid_dimensions)
            .any(|(c, dim)| c >= dim)
        {
            return Err(CellError::InvalidCoordinate {
                coord: coord.to_vec(),
                grid: self.grid_dimensions.clone(),
            });
        }
        Ok(())
    }

    /// Coordinate of the cell owning an array position
    pub fn cell_coord_of(&self, position: &[u64]) -> Result<CellCoord, CellError> {
        self.check_position(position)?;
        Ok(CellCoord(
            position
                .iter()
                .zip(&self.cell_dimensions)
                .map(|(&p, &c)| p / c as u64)
                .collect(),
        ))
    }

    /// Array-space box covered by a cell; boundary cells are clipped
    pub fn interval_of(&self, coord: &[u64]) -> Result<CellInterval, CellError> {
        self.check_coord(coord)?;
        let mut min = Vec::with_capacity(self.rank());
        let mut max = Vec::with_capacity(self.rank());
        for d in 0..self.rank() {
            let size = self.cell_dimensions[d] as u64;
            let lo = coord[d] * size;
            min.push(lo);
            max.push(lo.saturating_add(size).min(self.array_dimensions[d]) - 1);
        }
        Ok(CellInterval { min, max })
    }

    /// Mixed-radix index of a cell over the grid dimensions. Never exceeds
    /// `num_cells() - 1`, so the accumulation cannot overflow.
    pub fn linear_index(&self, coord: &[u64]) -> Result<u64, CellError> {
        self.check_coord(coord)?;
        let mut index = 0u64;
        for d in (0..self.rank()).rev() {
            index = index * self.grid_dimensions[d] + coord[d];
        }
        Ok(index)
    }

    pub fn coord_of_index(&self, index: u64) -> Result<CellCoord, CellError> {
        if index >= self.num_cells {
            return Err(CellError::InvalidCoordinate {
                coord: vec![index],
                grid: self.grid_dimensions.clone(),
            });
        }
        let mut remainder = index;
        let coord = self
            .grid_dimensions
            .iter()
            .map(|&dim| {
                let c = remainder % dim;
                remainder /= dim;
                c
            })
            .collect();
        Ok(CellCoord(coord))
    }

    /// Validated array-space box `[min, max]`
    pub fn interval(&self, min: &[u64], max: &[u64]) -> Result<CellInterval, CellError> {
        self.check_position(min)?;
        self.check_position(max)?;
        CellInterval::from_bounds(min.to_vec(), max.to_vec())
    }

    /// Coordinates of every cell touching the box `interval`
    pub fn cells_overlapping(&self, interval: &CellInterval) -> Result<Vec<CellCoord>, CellError> {
        self.check_position(interval.min())?;
        self.check_position(interval.max())?;
        let lo = self.cell_coord_of(interval.min())?;
        let hi = self.cell_coord_of(interval.max())?;
        Ok(CellInterval::new(lo.0, hi.0)
            .positions()
            .map(CellCoord)
            .collect())
    }
}
