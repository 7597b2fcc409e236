use criterion::{criterion_group, criterion_main, Criterion, black_box};

use brickmap::render::buffer::{HostAllocator, HostBuffer};
use brickmap::terrain::{DensitySampler, FbmDensity, NoiseParams, PlaneDensity};
use brickmap::voxel::brick::{encode_density, BrickLayout};
use brickmap::voxel::streaming::{BrickRequestQueue, StreamingConfig, StreamingManager};

use glam::{IVec3, UVec3};

fn bench_encode_density_8(c: &mut Criterion) {
    let layout = BrickLayout::new(8);
    let sampler = FbmDensity::new(NoiseParams { octaves: 3, ..Default::default() });
    let samples = sampler.sample_3d(IVec3::new(64, 0, 64), UVec3::splat(8), 0.05, 2);

    c.bench_function("encode_density_8", |b| {
        b.iter(|| encode_density(black_box(layout), black_box(&samples)));
    });
}

fn bench_fbm_sample_brick(c: &mut Criterion) {
    let sampler = FbmDensity::new(NoiseParams { octaves: 3, ..Default::default() });

    c.bench_function("fbm_sample_brick_8", |b| {
        b.iter(|| sampler.sample_3d(black_box(IVec3::new(64, 0, 64)), UVec3::splat(8), 0.05, 2));
    });
}

fn bench_queue_drain(c: &mut Criterion) {
    let mut queue: BrickRequestQueue<HostBuffer> = BrickRequestQueue::new(&HostAllocator, 1024).unwrap();

    c.bench_function("queue_enqueue_drain_1024", |b| {
        b.iter(|| {
            for i in 0..1024 {
                queue.enqueue(IVec3::new(i & 31, i >> 5, 0)).unwrap();
            }
            black_box(queue.drain_all().unwrap());
        });
    });
}

fn bench_process_requests(c: &mut Criterion) {
    let config = StreamingConfig {
        grid_dims: [32, 4, 32],
        brick_size: 8,
        pool_capacity: 4096,
        queue_capacity: 4096,
        ..Default::default()
    };

    c.bench_function("process_pending_requests_4096", |b| {
        b.iter(|| {
            let mut manager: StreamingManager<HostBuffer> =
                StreamingManager::new(&HostAllocator, config.clone(), PlaneDensity::new(12.0)).unwrap();
            let grid = *manager.grid();
            manager.emulate_consumer(grid.cells()).unwrap();
            black_box(manager.process_pending_requests().unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_encode_density_8,
    bench_fbm_sample_brick,
    bench_queue_drain,
    bench_process_requests,
);
criterion_main!(benches);
