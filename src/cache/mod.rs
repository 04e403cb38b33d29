use serde::{Deserialize, Serialize};

pub mod store;

/// Point-in-time counters of a [`store::CellStore`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Requests served from a resident cell
    pub hits: u64,
    /// Requests that started a load
    pub misses: u64,
    /// Requests that blocked on another caller's load
    pub waits: u64,
    /// Loader invocations that succeeded
    pub loads: u64,
    /// Loader invocations that failed or panicked
    pub failures: u64,
    /// Resident cells dropped by reclamation or explicit eviction
    pub evictions: u64,
    pub resident_bytes: usize,
    pub entry_count: usize,
    /// Loads currently running
    pub in_flight: usize,
}

impl CacheStats {
    /// Every `get`: hits, misses and waits
    pub fn requests(&self) -> u64 {
        self.hits + self.misses + self.waits
    }

    /// Share of requests that did not run the loader themselves
    pub fn hit_rate(&self) -> f64 {
        let total = self.requests();
        if total == 0 {
            0.0
        } else {
            (self.hits + self.waits) as f64 / total as f64
        }
    }
}
