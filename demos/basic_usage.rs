use lazy_cells::{
    CacheConfig, CellCoord, CellInterval, DenseArray, FetchConfig, FetchQueue, GridSpec,
    LazyArray, RandomAccess,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // A 1024x1024 source held in memory
    let source = Arc::new(DenseArray::from_fn(vec![1024, 1024], |p| {
        ((p[0] as f32) * 0.01).sin() + ((p[1] as f32) * 0.02).cos()
    }));

    // Cache it in 128x128 cells with a 16MB budget
    let config = CacheConfig {
        max_memory_size: 16 * 1024 * 1024,
        ..Default::default()
    };
    let cached = LazyArray::cache(Arc::clone(&source), vec![128, 128], config)?;

    // Second stage: threshold the first one on a coarser grid
    let upstream = cached.clone();
    let mask = LazyArray::generate(
        GridSpec::new(vec![1024, 1024], vec![256, 256])?,
        move |_: &CellCoord, interval: &CellInterval, data: &mut [u8]| {
            let mut values = vec![0f32; data.len()];
            upstream.read_interval(interval, &mut values)?;
            for (out, v) in data.iter_mut().zip(values) {
                *out = u8::from(v > 0.5);
            }
            Ok(())
        },
        CacheConfig::default(),
    );

    println!("source[100, 200] = {}", cached.read(&[100, 200])?);
    println!("mask[100, 200] = {}", mask.read(&[100, 200])?);

    // Non-blocking reads poll until the background fetch lands
    let queue = Arc::new(FetchQueue::current(FetchConfig::default())?);
    let volatile = mask.volatile(queue);
    loop {
        let read = volatile.try_read(&[900, 900])?;
        if read.valid {
            println!("mask[900, 900] = {} (volatile)", read.value);
            break;
        }
        println!("mask[900, 900] not ready yet");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    println!("Source cache stats: {:?}", cached.stats());
    println!("Mask cache stats: {:?}", mask.stats());

    // Drop everything released, then read again (recomputed)
    cached.store().reclaim(0);
    println!("After reclaim: {:?}", cached.stats());
    println!("source[100, 200] = {}", cached.read(&[100, 200])?);

    Ok(())
}
