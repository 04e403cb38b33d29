use crate::cache::store::CellStore;
use crate::cell::Element;
use crate::config::FetchConfig;
use crate::error::CellError;
use crate::grid::CellCoord;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::Semaphore;

/// Store id and linear cell index of a queued fetch
type FetchKey = (u64, u64);

/// Bounded background loader for volatile reads.
///
/// Loads run through the regular [`CellStore::get`] path on tokio's blocking
/// pool, so they coalesce with any foreground request for the same cell.
/// At most `num_threads` loads run at once.
pub struct FetchQueue {
    handle: Handle,
    /// Keeps an owned runtime alive; `None` when running on a caller's runtime
    _runtime: Option<Runtime>,
    permits: Arc<Semaphore>,
    pending: Arc<Mutex<HashSet<FetchKey>>>,
    config: FetchConfig,
}

impl FetchQueue {
    /// Queue backed by its own runtime.
    ///
    /// The owned runtime must not be dropped from within an async context;
    /// use [`FetchQueue::current`] or [`FetchQueue::with_handle`] there.
    pub fn new(config: FetchConfig) -> Result<Self, CellError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.num_threads.max(1))
            .thread_name("cell-fetch")
            .enable_all()
            .build()
            .map_err(|e| CellError::Runtime(e.to_string()))?;
        let handle = runtime.handle().clone();
        Ok(Self::build(handle, Some(runtime), config))
    }

    /// Queue that spawns onto an existing runtime
    pub fn with_handle(handle: Handle, config: FetchConfig) -> Self {
        Self::build(handle, None, config)
    }

    /// Queue that spawns onto the runtime of the calling context
    pub fn current(config: FetchConfig) -> Result<Self, CellError> {
        let handle = Handle::try_current().map_err(|e| CellError::Runtime(e.to_string()))?;
        Ok(Self::with_handle(handle, config))
    }

    fn build(handle: Handle, runtime: Option<Runtime>, config: FetchConfig) -> Self {
        Self {
            handle,
            _runtime: runtime,
            permits: Arc::new(Semaphore::new(config.num_threads.max(1))),
            pending: Arc::new(Mutex::new(HashSet::new())),
            config,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Requests queued or running
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Schedule a background load of `coord`.
    ///
    /// Returns `false` if the same cell is already queued or the queue is
    /// full; the caller simply asks again on its next poll.
    pub fn submit<T: Element>(
        &self,
        store: Arc<CellStore<T>>,
        coord: CellCoord,
    ) -> Result<bool, CellError> {
        let key = (store.id(), store.grid().linear_index(&coord)?);
        {
            let mut pending = self.pending.lock();
            if pending.contains(&key) {
                return Ok(false);
            }
            if pending.len() >= self.config.max_queue_size {
                tracing::debug!(
                    "Fetch queue full ({} pending), dropping request for cell {:?}",
                    pending.len(),
                    coord.as_slice()
                );
                return Ok(false);
            }
            pending.insert(key);
        }

        let permits = Arc::clone(&self.permits);
        let pending = Arc::clone(&self.pending);
        self.handle.spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(permit) => {
                    let task_coord = coord.clone();
                    tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        store.get(&task_coord).map(|_| ())
                    })
                    .await
                    .map_err(|e| CellError::Runtime(e.to_string()))
                    .and_then(|loaded| loaded)
                }
                Err(e) => Err(CellError::Runtime(e.to_string())),
            };

            // Release the slot only after the cell is resident so a poll in
            // between cannot schedule a second load.
            pending.lock().remove(&key);

            match outcome {
                Ok(()) => tracing::debug!("Fetched cell {:?}", coord.as_slice()),
                Err(e) => tracing::warn!(
                    "Background fetch of cell {:?} failed: {}",
                    coord.as_slice(),
                    e
                ),
            }
        });

        Ok(true)
    }
}

#[cfg(test)]
mod fetch_queue_tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::grid::{CellInterval, GridSpec};
    use std::time::{Duration, Instant};

    #[test]
    fn test_submit_coalesces_and_loads() {
        let queue = FetchQueue::new(FetchConfig::default()).unwrap();
        let grid = GridSpec::new(vec![4], vec![2]).unwrap();
        let store = Arc::new(CellStore::from_fn(
            grid,
            |_: &CellCoord, _: &CellInterval, data: &mut [u8]| {
                std::thread::sleep(Duration::from_millis(50));
                data.fill(7);
                Ok(())
            },
            CacheConfig::default(),
        ));
        let coord = CellCoord::from([1]);

        assert!(queue.submit(Arc::clone(&store), coord.clone()).unwrap());
        assert!(!queue.submit(Arc::clone(&store), coord.clone()).unwrap());

        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.pending() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(store.try_get(&coord).unwrap().unwrap().data(), &[7, 7]);
        assert_eq!(store.stats().loads, 1);
    }

    #[test]
    fn test_full_queue_drops_requests() {
        let config = FetchConfig {
            num_threads: 1,
            max_queue_size: 1,
        };
        let queue = FetchQueue::new(config).unwrap();
        let grid = GridSpec::new(vec![4], vec![1]).unwrap();
        let store = Arc::new(CellStore::from_fn(
            grid,
            |_: &CellCoord, _: &CellInterval, _: &mut [u8]| {
                std::thread::sleep(Duration::from_millis(100));
                Ok(())
            },
            CacheConfig::default(),
        ));

        assert!(queue.submit(Arc::clone(&store), CellCoord::from([0])).unwrap());
        assert!(!queue.submit(Arc::clone(&store), CellCoord::from([1])).unwrap());
    }
}
