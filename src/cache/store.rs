use crate::cache::CacheStats;
use crate::cell::{Cell, CellLoader, Element};
use crate::config::{CacheConfig, EvictionPolicy};
use crate::error::CellError;
use crate::grid::{CellCoord, CellInterval, GridSpec};
use crate::metrics;
use lru::LruCache;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(0);

type Outcome<T> = Result<Arc<Cell<T>>, CellError>;

/// Serves fully loaded cells by coordinate, computing each at most once
/// per residency.
///
/// A cell handed out as `Arc<Cell<T>>` stays strongly referenced while any
/// caller holds it. Once only the store holds it, it may be reclaimed under
/// [`EvictionPolicy::Soft`] and is transparently recomputed on the next
/// request.
pub struct CellStore<T: Element> {
    id: u64,
    grid: GridSpec,
    loader: Box<dyn CellLoader<T>>,
    config: CacheConfig,
    state: Mutex<StoreState<T>>,
    stats: CacheStatsInner,
}

struct StoreState<T> {
    /// Completed cells, most recently used first
    resident: LruCache<u64, Arc<Cell<T>>>,
    /// Loads currently running, keyed by linear cell index
    loading: HashMap<u64, Arc<InFlight<T>>>,
    /// Cell each blocked thread is waiting for
    waiting: HashMap<ThreadId, u64>,
    resident_bytes: usize,
}

struct CacheStatsInner {
    hits: AtomicU64,
    misses: AtomicU64,
    waits: AtomicU64,
    loads: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
}

/// In-flight marker for one cell; waiters block on `done` until the
/// loading thread publishes the outcome.
struct InFlight<T> {
    owner: ThreadId,
    outcome: Mutex<Option<Outcome<T>>>,
    done: Condvar,
}

impl<T> InFlight<T> {
    fn new(owner: ThreadId) -> Self {
        Self {
            owner,
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn complete(&self, outcome: Outcome<T>) {
        *self.outcome.lock() = Some(outcome);
        self.done.notify_all();
    }

    /// `None` if the timeout elapsed first
    fn wait(&self, timeout: Option<Duration>) -> Option<Outcome<T>> {
        let mut outcome = self.outcome.lock();
        match timeout {
            None => {
                while outcome.is_none() {
                    self.done.wait(&mut outcome);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while outcome.is_none() {
                    if self.done.wait_until(&mut outcome, deadline).timed_out() {
                        break;
                    }
                }
            }
        }
        outcome.clone()
    }
}

/// Publishes the outcome of a load exactly once, even if the loader panics.
struct LoadGuard<'a, T: Element> {
    store: &'a CellStore<T>,
    coord: &'a CellCoord,
    index: u64,
    in_flight: Arc<InFlight<T>>,
    finished: bool,
}

impl<T: Element> LoadGuard<'_, T> {
    fn finish(&mut self, outcome: Outcome<T>) -> Outcome<T> {
        self.finished = true;
        self.store.install(self.index, &outcome);
        self.in_flight.complete(outcome.clone());
        outcome
    }
}

impl<T: Element> Drop for LoadGuard<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            self.store.stats.failures.fetch_add(1, Ordering::Relaxed);
            metrics::record_failure();
            tracing::warn!("Loader panicked for cell {:?}", self.coord.as_slice());
            let err = CellError::loader_failure(self.coord, anyhow::anyhow!("loader panicked"));
            let _ = self.finish(Err(err));
        }
    }
}

impl<T: Element> CellStore<T> {
    pub fn new<L>(grid: GridSpec, loader: L, config: CacheConfig) -> Self
    where
        L: CellLoader<T>,
    {
        Self {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            grid,
            loader: Box::new(loader),
            config,
            state: Mutex::new(StoreState {
                resident: LruCache::unbounded(),
                loading: HashMap::new(),
                waiting: HashMap::new(),
                resident_bytes: 0,
            }),
            stats: CacheStatsInner {
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                waits: AtomicU64::new(0),
                loads: AtomicU64::new(0),
                failures: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            },
        }
    }

    /// Build a store from a loader closure
    pub fn from_fn<F>(grid: GridSpec, loader: F, config: CacheConfig) -> Self
    where
        F: Fn(&CellCoord, &CellInterval, &mut [T]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(grid, loader, config)
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cell at `coord`, loading it if needed.
    ///
    /// Blocks while another caller is loading the same cell and then returns
    /// that caller's result. Loader failures are returned to every waiter and
    /// are not cached.
    pub fn get(&self, coord: &CellCoord) -> Result<Arc<Cell<T>>, CellError> {
        let index = self.grid.linear_index(coord)?;
        let mut state = self.state.lock();

        if let Some(cell) = state.resident.get(&index) {
            let cell = Arc::clone(cell);
            drop(state);
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_hit();
            tracing::debug!("Cache HIT for cell {:?}", coord.as_slice());
            return Ok(cell);
        }

        if let Some(in_flight) = state.loading.get(&index).cloned() {
            let caller = thread::current().id();
            if Self::waits_on(&state, in_flight.owner, caller) {
                tracing::warn!(
                    "Cyclic wait on cell {:?}: its load depends on the calling thread",
                    coord.as_slice()
                );
                return Err(CellError::CyclicWait {
                    coord: coord.to_vec(),
                });
            }
            state.waiting.insert(caller, index);
            drop(state);
            self.stats.waits.fetch_add(1, Ordering::Relaxed);
            metrics::record_wait();

            tracing::debug!("Waiting for in-flight cell {:?}", coord.as_slice());
            let outcome = in_flight.wait(self.config.wait_timeout);
            self.state.lock().waiting.remove(&caller);

            return match outcome {
                Some(outcome) => outcome,
                None => {
                    let timeout = self.config.wait_timeout.unwrap_or_default();
                    tracing::warn!(
                        "Timed out after {:?} waiting for cell {:?}; {} loads in flight",
                        timeout,
                        coord.as_slice(),
                        self.state.lock().loading.len()
                    );
                    Err(CellError::WaitTimeout {
                        coord: coord.to_vec(),
                        timeout,
                    })
                }
            };
        }

        let in_flight = Arc::new(InFlight::new(thread::current().id()));
        state.loading.insert(index, Arc::clone(&in_flight));
        drop(state);

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_miss();
        tracing::debug!("Cache MISS for cell {:?}", coord.as_slice());

        let mut guard = LoadGuard {
            store: self,
            coord,
            index,
            in_flight,
            finished: false,
        };
        let outcome = self.compute(coord);
        guard.finish(outcome)
    }

    /// Return the cell at `coord` only if it is already resident.
    ///
    /// Never loads and never blocks on an in-flight load.
    pub fn try_get(&self, coord: &CellCoord) -> Result<Option<Arc<Cell<T>>>, CellError> {
        let index = self.grid.linear_index(coord)?;
        let mut state = self.state.lock();
        let cell = state.resident.get(&index).cloned();
        drop(state);
        if cell.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_hit();
        }
        Ok(cell)
    }

    pub fn contains(&self, coord: &CellCoord) -> Result<bool, CellError> {
        let index = self.grid.linear_index(coord)?;
        Ok(self.state.lock().resident.contains(&index))
    }

    pub fn is_loading(&self, coord: &CellCoord) -> Result<bool, CellError> {
        let index = self.grid.linear_index(coord)?;
        Ok(self.state.lock().loading.contains_key(&index))
    }

    /// Drop released cells, least recently used first, until resident data
    /// fits in `target_bytes`. Returns the number of cells dropped.
    ///
    /// Cells still held by a caller are never reclaimed, and nothing is
    /// reclaimed under [`EvictionPolicy::Strong`].
    pub fn reclaim(&self, target_bytes: usize) -> usize {
        if self.config.eviction == EvictionPolicy::Strong {
            return 0;
        }
        let mut state = self.state.lock();
        let evicted = self.reclaim_locked(&mut state, target_bytes);
        metrics::record_resident_bytes(state.resident_bytes);
        evicted
    }

    /// Force a resident cell out of the store. Callers already holding it
    /// keep a valid copy; the next request recomputes it.
    pub fn evict(&self, coord: &CellCoord) -> Result<bool, CellError> {
        let index = self.grid.linear_index(coord)?;
        let mut state = self.state.lock();
        let Some(cell) = state.resident.pop(&index) else {
            return Ok(false);
        };
        state.resident_bytes -= cell.size_bytes();
        metrics::record_resident_bytes(state.resident_bytes);
        drop(state);

        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        metrics::record_evictions(1);
        tracing::debug!("Evicted cell {:?}", coord.as_slice());
        Ok(true)
    }

    /// Drop every resident cell
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let count = state.resident.len() as u64;
        state.resident.clear();
        state.resident_bytes = 0;
        metrics::record_resident_bytes(0);
        drop(state);

        self.stats.evictions.fetch_add(count, Ordering::Relaxed);
        metrics::record_evictions(count);
    }

    /// Resident cell data in bytes
    pub fn size(&self) -> usize {
        self.state.lock().resident_bytes
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            waits: self.stats.waits.load(Ordering::Relaxed),
            loads: self.stats.loads.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            resident_bytes: state.resident_bytes,
            entry_count: state.resident.len(),
            in_flight: state.loading.len(),
        }
    }

    fn compute(&self, coord: &CellCoord) -> Outcome<T> {
        let interval = self.grid.interval_of(coord)?;
        let mut data = vec![T::default(); interval.num_elements()];

        let start = Instant::now();
        match self.loader.load(coord, &interval, &mut data) {
            Ok(()) => {
                let elapsed = start.elapsed();
                self.stats.loads.fetch_add(1, Ordering::Relaxed);
                metrics::record_load(elapsed);
                tracing::debug!("Loaded cell {:?} in {:?}", coord.as_slice(), elapsed);
                Ok(Arc::new(Cell::new(coord.clone(), interval, data)))
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                metrics::record_failure();
                tracing::warn!("Loader failed for cell {:?}: {:#}", coord.as_slice(), e);
                Err(CellError::loader_failure(coord, e))
            }
        }
    }

    /// Swap the in-flight marker for the completed cell under one lock so
    /// no request can observe the cell as neither loading nor resident.
    fn install(&self, index: u64, outcome: &Outcome<T>) {
        let mut state = self.state.lock();
        state.loading.remove(&index);

        let Ok(cell) = outcome else {
            return;
        };
        state.resident_bytes += cell.size_bytes();
        if let Some(previous) = state.resident.put(index, Arc::clone(cell)) {
            state.resident_bytes -= previous.size_bytes();
        }
        if self.config.eviction == EvictionPolicy::Soft
            && state.resident_bytes > self.config.max_memory_size
        {
            self.reclaim_locked(&mut state, self.config.max_memory_size);
        }
        metrics::record_resident_bytes(state.resident_bytes);
    }

    fn reclaim_locked(&self, state: &mut StoreState<T>, target_bytes: usize) -> usize {
        if state.resident_bytes <= target_bytes {
            return 0;
        }

        // Only the store holds a released cell, and clones are only made
        // under the state lock.
        let released: Vec<u64> = state
            .resident
            .iter()
            .rev()
            .filter(|(_, cell)| Arc::strong_count(cell) == 1)
            .map(|(index, _)| *index)
            .collect();

        let mut evicted = 0;
        for index in released {
            if state.resident_bytes <= target_bytes {
                break;
            }
            if let Some(cell) = state.resident.pop(&index) {
                state.resident_bytes -= cell.size_bytes();
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.stats
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
            metrics::record_evictions(evicted as u64);
            tracing::debug!(
                "Reclaimed {} released cells, {} bytes resident",
                evicted,
                state.resident_bytes
            );
        }
        evicted
    }

    /// Whether the load owned by `owner` is, through a chain of waits,
    /// blocked on `caller`.
    fn waits_on(state: &StoreState<T>, mut owner: ThreadId, caller: ThreadId) -> bool {
        for _ in 0..=state.waiting.len() {
            if owner == caller {
                return true;
            }
            let Some(index) = state.waiting.get(&owner) else {
                return false;
            };
            let Some(next) = state.loading.get(index) else {
                return false;
            };
            owner = next.owner;
        }
        false
    }
}
