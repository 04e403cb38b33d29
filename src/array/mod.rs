use crate::cell::Element;
use crate::error::CellError;
use crate::grid::CellInterval;

pub mod dense;
pub mod lazy;
pub mod source;
pub mod volatile;

/// Random access to an n-dimensional array of `T`
pub trait RandomAccess<T: Element>: Send + Sync + 'static {
    /// Extent along each axis
    fn dimensions(&self) -> &[u64];

    /// Element at `position`
    fn read(&self, position: &[u64]) -> Result<T, CellError>;

    /// Copy the box `interval` into `dest`, first axis fastest
    fn read_interval(&self, interval: &CellInterval, dest: &mut [T]) -> Result<(), CellError> {
        check_dest(interval, dest)?;
        for (slot, position) in dest.iter_mut().zip(interval.positions()) {
            *slot = self.read(&position)?;
        }
        Ok(())
    }
}

pub(crate) fn check_dest<T>(interval: &CellInterval, dest: &[T]) -> Result<(), CellError> {
    let expected = interval.num_elements();
    if dest.len() != expected {
        return Err(CellError::DimensionMismatch {
            expected,
            actual: dest.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_position(dimensions: &[u64], position: &[u64]) -> Result<(), CellError> {
    if position.len() != dimensions.len() {
        return Err(CellError::DimensionMismatch {
            expected: dimensions.len(),
            actual: position.len(),
        });
    }
    if position.iter().zip(dimensions).any(|(p, dim)| p >= dim) {
        return Err(CellError::OutOfBounds {
            position: position.to_vec(),
            dimensions: dimensions.to_vec(),
        });
    }
    Ok(())
}

/// Result of a non-blocking read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volatile<T> {
    pub valid: bool,
    pub value: T,
}

impl<T: Element> Volatile<T> {
    pub fn valid(value: T) -> Self {
        Self { valid: true, value }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            value: T::default(),
        }
    }

    /// The value if it was available
    pub fn get(self) -> Option<T> {
        self.valid.then_some(self.value)
    }
}
