//! Brickmap - headless streaming simulation
//!
//! Runs the raycast consumer on the CPU against the real streaming buffers
//! and drives the load queue frame by frame until the world is resolved.
//!
//! Usage:
//!   brickmap [--config world.json] [--grid 32] [--brick 8] [--capacity 4096]
//!            [--queue 1024] [--seed 2] [--frequency 0.005] [--frames 64]
//!            [--preload] [--gpu]
//!   brickmap --emit-wgsl

use std::path::PathBuf;
use std::time::Instant;

use brickmap::core::{logging, Result};
use brickmap::render::buffer::{BufferAllocator, GpuBuffer, HostAllocator};
use brickmap::render::context::GpuContext;
use brickmap::render::shader::wgsl_prelude;
use brickmap::terrain::FbmDensity;
use brickmap::voxel::streaming::{StreamingConfig, StreamingManager};

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    if args.iter().any(|a| a == "--emit-wgsl") {
        print!("{}", wgsl_prelude(0));
        return Ok(());
    }

    let mut config = match parse_str_arg(args, "--config") {
        Some(path) => StreamingConfig::from_json_file(&PathBuf::from(path))?,
        None => StreamingConfig::default(),
    };
    if let Some(grid) = parse_u32_arg(args, "--grid") {
        config.grid_dims = [grid; 3];
    }
    if let Some(brick) = parse_u32_arg(args, "--brick") {
        config.brick_size = brick;
    }
    if let Some(capacity) = parse_u32_arg(args, "--capacity") {
        config.pool_capacity = capacity;
    }
    if let Some(queue) = parse_u32_arg(args, "--queue") {
        config.queue_capacity = queue;
    }
    if let Some(seed) = parse_u32_arg(args, "--seed") {
        config.generation.seed = seed;
    }
    if let Some(frequency) = parse_f32_arg(args, "--frequency") {
        config.generation.frequency = frequency;
    }
    config.validate()?;

    let frames = parse_u32_arg(args, "--frames").unwrap_or(64);
    let preload = args.iter().any(|a| a == "--preload");

    println!("=== Brickmap Streaming ===");
    println!("Grid:     {:?} cells", config.grid_dims);
    println!("Brick:    {}³ voxels", config.brick_size);
    println!("Pool:     {} slots", config.pool_capacity);
    println!("Queue:    {} requests/frame", config.queue_capacity);
    println!("Seed:     {}, frequency {}", config.generation.seed, config.generation.frequency);
    println!();

    if args.iter().any(|a| a == "--gpu") {
        let context = GpuContext::new_headless_blocking()?;
        simulate(&context.allocator(), config, frames, preload)
    } else {
        simulate(&HostAllocator, config, frames, preload)
    }
}

fn simulate<A>(allocator: &A, config: StreamingConfig, frames: u32, preload: bool) -> Result<()>
where
    A: BufferAllocator,
    A::Buffer: GpuBuffer,
{
    let sampler = FbmDensity::new(config.generation.noise.clone());
    let mut manager = StreamingManager::new(allocator, config, sampler)?;
    let start = Instant::now();

    if preload {
        let stats = manager.preload_all()?;
        println!(
            "Preloaded: {} bricks, {} empty, {} left unloaded",
            stats.inserted,
            stats.marked_empty,
            stats.rejected.len()
        );
    } else {
        let grid = *manager.grid();
        for _ in 0..frames {
            let pass = manager.emulate_consumer(grid.cells())?;
            if pass.misses() == 0 {
                log::info!("All {} cells resolved after {} frames", grid.cell_count(), manager.frame());
                break;
            }

            let stats = manager.process_pending_requests()?;
            log::info!(
                "Frame {}: {} hits, {} misses, {} inserted, {} empty, {} rejected",
                stats.frame,
                pass.hits,
                pass.misses(),
                stats.inserted,
                stats.marked_empty,
                stats.rejected.len()
            );

            if stats.capacity_exhausted() && stats.inserted == 0 && stats.marked_empty == 0 {
                log::warn!("Pool exhausted, no further progress possible");
                break;
            }
        }
    }

    manager.verify_consistency()?;

    let index = manager.index_table();
    println!();
    println!("Loaded bricks:  {}", manager.loaded_bricks());
    println!("Filled voxels:  {}", manager.filled_voxels());
    println!("Empty cells:    {}", index.empty_count());
    println!("Unloaded cells: {}", index.unloaded_count());
    println!("Pool usage:     {:.1}%", manager.utilization());
    println!("Elapsed:        {:.2}s", start.elapsed().as_secs_f64());

    if !preload && index.unloaded_count() > 0 {
        log::warn!("{} cells still unloaded after {} frames", index.unloaded_count(), manager.frame());
    }
    Ok(())
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
