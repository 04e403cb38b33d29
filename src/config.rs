use crate::error::CellError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reference-strength policy for cells the store has handed out and
/// callers have since released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Never reclaim resident cells while the store exists
    Strong,
    /// Reclaim released cells under memory pressure
    #[default]
    Soft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Eviction policy for released cells
    pub eviction: EvictionPolicy,

    /// Soft budget for resident cell data in bytes
    pub max_memory_size: usize,

    /// Upper bound on how long a caller waits for another caller's load
    pub wait_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            eviction: EvictionPolicy::Soft,
            max_memory_size: 256 * 1024 * 1024, // 256MB
            wait_timeout: None,
        }
    }
}

impl CacheConfig {
    /// Configuration that keeps every computed cell resident
    pub fn strong() -> Self {
        Self {
            eviction: EvictionPolicy::Strong,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON, filling omitted fields with defaults
    pub fn from_json(json: &str) -> Result<Self, CellError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Configuration for the background fetch queue
///
/// # Default Values
/// - `num_threads`: available CPUs minus one, at least 1
/// - `max_queue_size`: 1024 outstanding requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of cells loaded concurrently in the background
    pub num_threads: usize,

    /// Maximum number of outstanding fetch requests
    pub max_queue_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self {
            num_threads: cpus.saturating_sub(1).max(1),
            max_queue_size: 1024,
        }
    }
}

impl FetchConfig {
    pub fn from_json(json: &str) -> Result<Self, CellError> {
        Ok(serde_json::from_str(json)?)
    }
}
