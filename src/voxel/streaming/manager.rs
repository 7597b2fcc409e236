//! Streaming Manager - Coordinates brick streaming components
//!
//! Integrates BrickPool, IndexTable and BrickRequestQueue to provide
//! on-demand brick generation driven by requests from the raycaster.
//!
//! Per requested cell:
//! ```text
//! Unloaded --generate--> Empty                       (terminal)
//! Unloaded --generate--> pending insert --> Resident (terminal)
//! ```
//! A pool overflow leaves the cell Unloaded so it is requested again.

use std::collections::HashSet;

use glam::IVec3;

use super::config::StreamingConfig;
use super::consumer::{ConsumerPass, PassStats};
use super::{BrickPool, BrickRequestQueue, CellState, IndexTable};
use crate::core::{Error, Result};
use crate::render::buffer::{BufferAllocator, GpuBuffer, GpuWorldConfig};
use crate::terrain::density::DensitySampler;
use crate::voxel::brick::{encode_density, BrickLayout, EncodedBrick};
use crate::voxel::grid::Grid;

/// What one call to `process_pending_requests` did
#[derive(Debug, Default)]
pub struct FrameStats {
    /// Frame number
    pub frame: u64,
    /// Raw request counter seen at drain time
    pub requests_observed: u32,
    /// Requests actually read (after the capacity clamp)
    pub requests_read: u32,
    /// Repeats of a cell already handled in this batch
    pub duplicates: u32,
    /// Requests for cells that were already resolved
    pub stale: u32,
    /// Requests for cells outside the grid
    pub out_of_bounds: u32,
    /// Bricks sampled and encoded
    pub generated: u32,
    /// Cells resolved as empty
    pub marked_empty: u32,
    /// Bricks admitted to the pool
    pub inserted: u32,
    /// Cells left unloaded because the pool is full
    pub rejected: Vec<IVec3>,
    /// Non-fatal errors raised this frame
    pub errors: Vec<Error>,
}

impl FrameStats {
    /// True if the pool ran out of slots this frame
    pub fn capacity_exhausted(&self) -> bool {
        !self.rejected.is_empty()
    }

    /// True if the request queue overflowed this frame
    pub fn queue_overflowed(&self) -> bool {
        self.requests_observed > self.requests_read
    }
}

/// Streaming manager owning the pool, index table and request queue
pub struct StreamingManager<B: GpuBuffer> {
    config: StreamingConfig,
    grid: Grid,
    layout: BrickLayout,
    /// World config block (grid dims, brick size)
    world_config: B,
    /// Grid cell -> residency
    index: IndexTable<B>,
    /// Resident bricks
    pool: BrickPool<B>,
    /// Requests from the raycaster
    queue: BrickRequestQueue<B>,
    /// Density field used to generate bricks
    sampler: Box<dyn DensitySampler>,
    /// Current frame number
    frame: u64,
    /// Solid voxels across all resident bricks
    filled_voxels: u64,
}

impl<B: GpuBuffer> StreamingManager<B> {
    /// Create the streaming world and upload its initial buffers
    pub fn new<A>(allocator: &A, config: StreamingConfig, sampler: impl DensitySampler + 'static) -> Result<Self>
    where
        A: BufferAllocator<Buffer = B>,
    {
        config.validate()?;
        let grid = config.grid();
        let layout = config.layout();

        let gpu_config = GpuWorldConfig::new(grid.dims(), layout.size());
        let mut world_config = allocator.create_buffer("world_config", GpuWorldConfig::SIZE)?;
        world_config.upload(0, bytemuck::bytes_of(&gpu_config))?;

        let index = IndexTable::new(allocator, grid)?;
        let pool = BrickPool::new(allocator, layout, config.pool_capacity)?;
        let queue = BrickRequestQueue::new(allocator, config.queue_capacity)?;

        log::info!(
            "StreamingManager: grid {:?} ({} cells), {}³ bricks, pool {} slots, queue {} requests",
            grid.dims(),
            grid.cell_count(),
            layout.size(),
            config.pool_capacity,
            config.queue_capacity
        );

        Ok(Self {
            config,
            grid,
            layout,
            world_config,
            index,
            pool,
            queue,
            sampler: Box::new(sampler),
            frame: 0,
            filled_voxels: 0,
        })
    }

    /// Drain the request queue and resolve every requested cell.
    ///
    /// Call once per frame, after the raycast dispatch and its memory
    /// barrier. Pool and queue overflow are reported in the returned stats
    /// and never fail the frame; only buffer transport errors do.
    pub fn process_pending_requests(&mut self) -> Result<FrameStats> {
        self.frame += 1;
        let mut stats = FrameStats { frame: self.frame, ..Default::default() };

        let drain = self.queue.drain_all()?;
        stats.requests_observed = drain.observed;
        stats.requests_read = drain.cells.len() as u32;

        if drain.overflowed() {
            log::debug!(
                "Request queue overflow: {} requests, {} read, {} dropped",
                drain.observed,
                drain.capacity,
                drain.dropped()
            );
            stats.errors.push(Error::QueueOverflow {
                observed: drain.observed,
                capacity: drain.capacity,
            });
        }

        let mut seen = HashSet::with_capacity(drain.cells.len());
        for cell in drain.cells {
            if !seen.insert(cell) {
                stats.duplicates += 1;
                continue;
            }
            self.resolve(cell, &mut stats)?;
        }

        if let Some(first) = stats.rejected.first() {
            log::warn!(
                "Brick pool full ({} slots): {} cells left unloaded this frame (first {:?})",
                self.pool.capacity(),
                stats.rejected.len(),
                first
            );
        }

        if stats.requests_observed > 0 {
            log::debug!(
                "Frame {}: {} requests, {} generated, {} inserted, {} empty, pool utilization: {:.1}%",
                self.frame,
                stats.requests_read,
                stats.generated,
                stats.inserted,
                stats.marked_empty,
                self.pool.utilization()
            );
        }

        Ok(stats)
    }

    /// Resolve one cell unless it is already resolved
    fn resolve(&mut self, cell: IVec3, stats: &mut FrameStats) -> Result<()> {
        let state = match self.index.lookup(cell) {
            Ok(state) => state,
            Err(Error::CellOutOfBounds(cell)) => {
                log::trace!("Ignoring request outside grid: {:?}", cell);
                stats.out_of_bounds += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if state.is_resolved() {
            stats.stale += 1;
            return Ok(());
        }

        let encoded = self.generate_brick(cell);
        stats.generated += 1;

        if encoded.is_empty() {
            self.index.mark_empty(cell)?;
            stats.marked_empty += 1;
            return Ok(());
        }

        let filled = encoded.filled;
        match self.pool.append(encoded.mask) {
            Ok(slot) => {
                // Every claimed slot must be referenced by the index
                if let Err(e) = self.index.mark_resident(cell, slot) {
                    self.pool.rollback(slot)?;
                    return Err(e);
                }
                self.filled_voxels += filled as u64;
                stats.inserted += 1;
                log::trace!("Cell {:?} resident in slot {} ({} voxels)", cell, slot, filled);
            }
            Err(e @ Error::CapacityExceeded { .. }) => {
                log::trace!("Cell {:?} left unloaded: {}", cell, e);
                stats.rejected.push(cell);
                stats.errors.push(e);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Sample and encode the brick for `cell`. Deterministic for a fixed config.
    pub fn generate_brick(&self, cell: IVec3) -> EncodedBrick {
        let generation = &self.config.generation;
        let origin = Grid::voxel_origin(cell, self.layout.size());
        let samples = self.sampler.sample_3d(
            origin,
            self.layout.extent(),
            generation.frequency,
            generation.seed,
        );
        encode_density(self.layout, &samples)
    }

    /// Resolve every unloaded cell in grid order.
    ///
    /// Non-streaming fallback: generates the whole world up front. Once the
    /// pool fills, the remaining solid cells stay unloaded and are listed in
    /// `rejected`.
    pub fn preload_all(&mut self) -> Result<FrameStats> {
        let mut stats = FrameStats { frame: self.frame, ..Default::default() };

        for index in 0..self.grid.cell_count() {
            let cell = self.grid.coord_of(index);
            self.resolve(cell, &mut stats)?;
        }

        if !stats.rejected.is_empty() {
            log::warn!(
                "Preload stopped at pool capacity {}: {} solid cells left unloaded",
                self.pool.capacity(),
                stats.rejected.len()
            );
        }
        log::info!(
            "Preloaded {} bricks ({} empty cells), {} filled voxels, pool utilization: {:.1}%",
            stats.inserted,
            stats.marked_empty,
            self.filled_voxels,
            self.pool.utilization()
        );

        Ok(stats)
    }

    /// Queue a request from the CPU side
    pub fn request(&mut self, cell: IVec3) -> Result<bool> {
        self.queue.enqueue(cell)
    }

    /// Run a consumer pass over `cells` against the current GPU index buffer
    pub fn emulate_consumer<I>(&mut self, cells: I) -> Result<PassStats>
    where
        I: IntoIterator<Item = IVec3>,
    {
        let pass = ConsumerPass::capture(&self.index)?;
        pass.visit_all(&mut self.queue, cells)
    }

    /// Check that every resident cell points at a populated slot
    pub fn verify_consistency(&self) -> Result<()> {
        for (_, state) in self.index.iter() {
            if let CellState::Resident { slot } = state {
                self.pool.get(slot)?;
            }
        }
        if self.index.resident_count() > self.pool.len() {
            return Err(Error::InvalidSlot {
                slot: self.index.resident_count(),
                len: self.pool.len(),
            });
        }
        Ok(())
    }

    /// Residency of a cell
    pub fn lookup(&self, cell: IVec3) -> Result<CellState> {
        self.index.lookup(cell)
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn layout(&self) -> BrickLayout {
        self.layout
    }

    /// Frames processed so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Solid voxels across resident bricks
    pub fn filled_voxels(&self) -> u64 {
        self.filled_voxels
    }

    /// Get loaded brick count
    pub fn loaded_bricks(&self) -> u32 {
        self.pool.len()
    }

    /// Get pool utilization percentage
    pub fn utilization(&self) -> f32 {
        self.pool.utilization()
    }

    pub fn pool(&self) -> &BrickPool<B> {
        &self.pool
    }

    pub fn index_table(&self) -> &IndexTable<B> {
        &self.index
    }

    pub fn request_queue(&self) -> &BrickRequestQueue<B> {
        &self.queue
    }

    /// World config buffer for shader binding
    pub fn world_config_buffer(&self) -> &B {
        &self.world_config
    }

    /// Index table buffer for shader binding
    pub fn index_buffer(&self) -> &B {
        self.index.buffer()
    }

    /// Brick pool buffer for shader binding
    pub fn brick_pool_buffer(&self) -> &B {
        self.pool.buffer()
    }

    /// Request queue buffer for shader binding
    pub fn request_buffer(&self) -> &B {
        self.queue.buffer()
    }
}
