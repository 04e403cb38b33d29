//! Export of cell store counters through the `metrics` facade.
//!
//! Without the `metrics` feature every function here is a no-op.

#[cfg(not(feature = "metrics"))]
use std::time::Duration;

#[cfg(feature = "metrics")]
mod enabled {
    use std::time::Duration;

    pub fn record_hit() {
        ::metrics::increment_counter!("lazy_cells.hits");
    }

    pub fn record_miss() {
        ::metrics::increment_counter!("lazy_cells.misses");
    }

    pub fn record_wait() {
        ::metrics::increment_counter!("lazy_cells.waits");
    }

    pub fn record_load(elapsed: Duration) {
        ::metrics::increment_counter!("lazy_cells.loads");
        ::metrics::histogram!("lazy_cells.load_seconds", elapsed.as_secs_f64());
    }

    pub fn record_failure() {
        ::metrics::increment_counter!("lazy_cells.failures");
    }

    pub fn record_evictions(count: u64) {
        ::metrics::counter!("lazy_cells.evictions", count);
    }

    pub fn record_resident_bytes(bytes: usize) {
        ::metrics::gauge!("lazy_cells.resident_bytes", bytes as f64);
    }
}

#[cfg(feature = "metrics")]
pub(crate) use enabled::*;

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_hit() {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_miss() {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_wait() {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_load(_elapsed: Duration) {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_failure() {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_evictions(_count: u64) {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_resident_bytes(_bytes: usize) {}
