use lazy_cells::{
    CacheConfig, CellCoord, CellError, CellInterval, DenseArray, GridSpec, LazyArray,
    RandomAccess,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn checkerboard(dimensions: Vec<u64>) -> Arc<DenseArray<i32>> {
    Arc::new(DenseArray::from_fn(dimensions, |p| {
        p.iter().enumerate().map(|(d, x)| (d as i32 + 1) * *x as i32).sum()
    }))
}

#[test]
fn test_end_to_end_cell_index_broadcast() {
    let grid = GridSpec::new(vec![8, 8], vec![4, 4]).unwrap();
    let index_grid = grid.clone();
    let array = LazyArray::generate(
        grid,
        move |coord: &CellCoord, _: &CellInterval, data: &mut [u64]| {
            data.fill(index_grid.linear_index(coord)?);
            Ok(())
        },
        CacheConfig::default(),
    );

    assert_eq!(array.read(&[0, 0]).unwrap(), 0);
    assert_eq!(array.read(&[7, 0]).unwrap(), 1);
    assert_eq!(array.read(&[0, 7]).unwrap(), 2);
    assert_eq!(array.read(&[5, 5]).unwrap(), 3);
    assert_eq!(array.stats().loads, 4);
}

#[test]
fn test_cached_view_matches_source_in_3d() {
    let source = checkerboard(vec![7, 5, 6]);
    let cached = LazyArray::cache(Arc::clone(&source), vec![3, 2, 4], CacheConfig::default())
        .unwrap();

    let everything = CellInterval::from_bounds(vec![0, 0, 0], vec![6, 4, 5]).unwrap();
    for position in everything.positions() {
        assert_eq!(
            cached.read(&position).unwrap(),
            source.read(&position).unwrap(),
            "mismatch at {position:?}"
        );
    }

    // 3 x 3 x 2 cells, each loaded once
    assert_eq!(cached.grid().num_cells(), 18);
    assert_eq!(cached.stats().loads, 18);
}

#[test]
fn test_repeated_reads_do_not_reload() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let array = LazyArray::generate(
        GridSpec::new(vec![16, 16], vec![8, 8]).unwrap(),
        move |_: &CellCoord, interval: &CellInterval, data: &mut [u16]| {
            counter.fetch_add(1, Ordering::SeqCst);
            for (value, position) in data.iter_mut().zip(interval.positions()) {
                *value = (position[0] * 16 + position[1]) as u16;
            }
            Ok(())
        },
        CacheConfig::default(),
    );

    for _ in 0..3 {
        for x in 0..16 {
            for y in 0..16 {
                assert_eq!(array.read(&[x, y]).unwrap(), (x * 16 + y) as u16);
            }
        }
    }

    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_concurrent_readers_load_each_cell_once() {
    let source = checkerboard(vec![32, 32]);
    let cached = LazyArray::cache(Arc::clone(&source), vec![8, 8], CacheConfig::default())
        .unwrap();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let cached = cached.clone();
            let source = Arc::clone(&source);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..32u64 {
                    for j in 0..32u64 {
                        let position = [(i + t * 4) % 32, j];
                        assert_eq!(
                            cached.read(&position).unwrap(),
                            source.read(&position).unwrap()
                        );
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = cached.stats();
    assert_eq!(stats.loads, 16);
    assert_eq!(stats.misses, 16);
    assert_eq!(stats.failures, 0);
}

#[test]
fn test_pipeline_of_lazy_arrays() {
    let source = checkerboard(vec![12, 12]);
    let first = LazyArray::cache(source, vec![4, 4], CacheConfig::default()).unwrap();

    // Second stage doubles every element of the first, on a different grid
    let upstream = first.clone();
    let second = LazyArray::generate(
        GridSpec::new(vec![12, 12], vec![6, 3]).unwrap(),
        move |_: &CellCoord, interval: &CellInterval, data: &mut [i32]| {
            upstream.read_interval(interval, data)?;
            data.iter_mut().for_each(|v| *v *= 2);
            Ok(())
        },
        CacheConfig::default(),
    );

    assert_eq!(second.read(&[5, 7]).unwrap(), 2 * (5 + 2 * 7));
    assert_eq!(second.read(&[11, 11]).unwrap(), 2 * (11 + 2 * 11));
    assert_eq!(second.stats().loads, 2);
    // The two second-stage cells cover five first-stage cells, one shared
    assert_eq!(first.stats().loads, 5);
}

#[test]
fn test_boundary_cells_are_clipped() {
    let array = LazyArray::generate(
        GridSpec::new(vec![10], vec![4]).unwrap(),
        |_: &CellCoord, interval: &CellInterval, data: &mut [u64]| {
            for (value, position) in data.iter_mut().zip(interval.positions()) {
                *value = position[0];
            }
            Ok(())
        },
        CacheConfig::default(),
    );

    let intervals: Vec<_> = array
        .cells()
        .map(|cell| {
            let cell = cell.unwrap();
            (cell.interval().min()[0], cell.interval().max()[0], cell.len())
        })
        .collect();
    assert_eq!(intervals, vec![(0, 3, 4), (4, 7, 4), (8, 9, 2)]);

    assert_eq!(array.read(&[9]).unwrap(), 9);
    assert!(matches!(
        array.read(&[10]),
        Err(CellError::OutOfBounds { .. })
    ));
}

#[test]
fn test_range_read_spanning_boundary_cells() {
    let source = checkerboard(vec![10, 9]);
    let cached = LazyArray::cache(Arc::clone(&source), vec![4, 4], CacheConfig::default())
        .unwrap();
    let interval = cached.grid().interval(&[2, 3], &[9, 8]).unwrap();

    let mut from_cache = vec![0; interval.num_elements()];
    let mut from_source = vec![0; interval.num_elements()];
    cached.read_interval(&interval, &mut from_cache).unwrap();
    source.read_interval(&interval, &mut from_source).unwrap();

    assert_eq!(from_cache, from_source);
    // x cells 0..=2, y cells 0..=2
    assert_eq!(cached.stats().loads, 9);
}

#[test]
fn test_loader_error_surfaces_through_read() {
    let array = LazyArray::generate(
        GridSpec::new(vec![8], vec![4]).unwrap(),
        |coord: &CellCoord, _: &CellInterval, data: &mut [f64]| {
            if coord[0] == 1 {
                anyhow::bail!("tile {} missing", coord[0]);
            }
            data.fill(0.5);
            Ok(())
        },
        CacheConfig::default(),
    );

    assert_eq!(array.read(&[3]).unwrap(), 0.5);
    let err = array.read(&[4]).unwrap_err();
    assert!(matches!(err, CellError::LoaderFailure { .. }));
    assert!(err.to_string().contains("tile 1 missing"));
}

#[test]
fn test_rank_mismatch_is_rejected() {
    let source = checkerboard(vec![4, 4]);
    let cached = LazyArray::cache(source, vec![2, 2], CacheConfig::default()).unwrap();

    assert!(matches!(
        cached.read(&[1]),
        Err(CellError::DimensionMismatch { .. })
    ));
    assert!(matches!(
        LazyArray::cache(checkerboard(vec![4, 4]), vec![2], CacheConfig::default()),
        Err(CellError::InvalidGrid(_))
    ));
}
