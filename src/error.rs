use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CellError {
    #[error("Position {position:?} is outside array dimensions {dimensions:?}")]
    OutOfBounds {
        position: Vec<u64>,
        dimensions: Vec<u64>,
    },

    #[error("Cell coordinate {coord:?} is outside grid dimensions {grid:?}")]
    InvalidCoordinate { coord: Vec<u64>, grid: Vec<u64> },

    #[error("Loader failed for cell {coord:?}: {cause}")]
    LoaderFailure {
        coord: Vec<u64>,
        cause: Arc<anyhow::Error>,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Cyclic wait detected on cell {coord:?}")]
    CyclicWait { coord: Vec<u64> },

    #[error("Timed out after {timeout:?} waiting for cell {coord:?}")]
    WaitTimeout { coord: Vec<u64>, timeout: Duration },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl CellError {
    pub(crate) fn loader_failure(coord: &[u64], cause: anyhow::Error) -> Self {
        Self::LoaderFailure {
            coord: coord.to_vec(),
            cause: Arc::new(cause),
        }
    }
}

impl From<serde_json::Error> for CellError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
