use lazy_cells::{
    CacheConfig, CellCoord, CellInterval, FetchConfig, FetchQueue, GridSpec, LazyArray,
    VolatileArray,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn slow_index_array(delay: Duration) -> LazyArray<u64> {
    let grid = GridSpec::new(vec![8, 8], vec![4, 4]).unwrap();
    let index_grid = grid.clone();
    LazyArray::generate(
        grid,
        move |coord: &CellCoord, _: &CellInterval, data: &mut [u64]| {
            std::thread::sleep(delay);
            data.fill(index_grid.linear_index(coord)? + 1);
            Ok(())
        },
        CacheConfig::default(),
    )
}

async fn poll_until_valid(volatile: &VolatileArray<u64>, position: &[u64]) -> Option<u64> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Some(value) = volatile.try_read(position).unwrap().get() {
            return Some(value);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_first_read_is_invalid_then_becomes_valid() {
    let queue = Arc::new(FetchQueue::current(FetchConfig::default()).unwrap());
    let array = slow_index_array(Duration::from_millis(100));
    let volatile = array.volatile(queue);

    let start = Instant::now();
    let first = volatile.try_read(&[5, 5]).unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));
    assert!(!first.valid);
    assert_eq!(first.value, 0);

    assert_eq!(poll_until_valid(&volatile, &[5, 5]).await, Some(4));
    assert_eq!(array.stats().loads, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_repeated_polls_coalesce() {
    let queue = Arc::new(FetchQueue::current(FetchConfig::default()).unwrap());
    let array = slow_index_array(Duration::from_millis(50));
    let volatile = array.volatile(Arc::clone(&queue));

    for _ in 0..20 {
        assert!(!volatile.try_read(&[0, 0]).unwrap().valid);
    }
    assert_eq!(poll_until_valid(&volatile, &[0, 0]).await, Some(1));

    assert_eq!(array.stats().loads, 1);

    // The slot is released once the fetch task finishes
    let deadline = Instant::now() + Duration::from_secs(5);
    while queue.pending() > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(queue.pending(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_and_volatile_views_share_cells() {
    let queue = Arc::new(FetchQueue::current(FetchConfig::default()).unwrap());
    let array = slow_index_array(Duration::ZERO);
    let volatile = array.volatile(queue);

    let reader = array.clone();
    let value = tokio::task::spawn_blocking(move || {
        use lazy_cells::RandomAccess;
        reader.read(&[6, 1]).unwrap()
    })
    .await
    .unwrap();
    assert_eq!(value, 2);

    let read = volatile.try_read(&[7, 2]).unwrap();
    assert!(read.valid);
    assert_eq!(read.value, 2);
    assert_eq!(array.stats().loads, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_fetch_is_retried_on_next_poll() {
    let queue = Arc::new(FetchQueue::current(FetchConfig::default()).unwrap());
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let array = LazyArray::generate(
        GridSpec::new(vec![4], vec![4]).unwrap(),
        move |_: &CellCoord, _: &CellInterval, data: &mut [u64]| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("transient read error");
            }
            data.fill(42);
            Ok(())
        },
        CacheConfig::default(),
    );
    let volatile = array.volatile(Arc::clone(&queue));

    assert_eq!(poll_until_valid(&volatile, &[2]).await, Some(42));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(array.stats().failures, 1);
}

#[test]
fn test_volatile_with_owned_runtime() {
    let queue = Arc::new(FetchQueue::new(FetchConfig {
        num_threads: 2,
        max_queue_size: 16,
    })
    .unwrap());
    let array = slow_index_array(Duration::from_millis(20));
    let volatile = array.volatile(queue);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut values = Vec::new();
    while values.len() < 4 && Instant::now() < deadline {
        values = [[0u64, 0], [4, 0], [0, 4], [4, 4]]
            .iter()
            .filter_map(|p| volatile.try_read(p).unwrap().get())
            .collect();
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(values, vec![1, 2, 3, 4]);
    assert_eq!(array.stats().loads, 4);
}

#[test]
fn test_out_of_bounds_is_an_error_not_invalid() {
    let queue = Arc::new(FetchQueue::new(FetchConfig::default()).unwrap());
    let volatile = slow_index_array(Duration::ZERO).volatile(queue);

    assert!(volatile.try_read(&[8, 0]).is_err());
    assert!(volatile.try_read(&[0]).is_err());
}
