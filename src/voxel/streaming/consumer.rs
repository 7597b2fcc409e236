//! CPU stand-in for the raycast consumer
//!
//! The real consumer is a compute shader: it reads the GPU index buffer and,
//! on an unloaded cell, appends a request to the queue. This module performs
//! the same steps against the same buffers. Headless runs and tests use it
//! to drive the protocol end to end without a shader.

use glam::IVec3;

use crate::core::{Error, Result};
use crate::render::buffer::GpuBuffer;
use crate::voxel::grid::Grid;
use crate::voxel::streaming::index_table::{CellState, IndexTable, ENTRY_SIZE};
use crate::voxel::streaming::request_queue::BrickRequestQueue;

/// Outcome of looking up one cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    /// Brick is resident in `slot`
    Hit { slot: u32 },
    /// Cell was resolved as empty, nothing to draw
    Empty,
    /// Cell is missing and a request was queued
    Requested,
    /// Cell is missing but the queue was already full
    Dropped,
}

/// Counters for one consumer pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    pub hits: u32,
    pub empty: u32,
    pub requested: u32,
    pub dropped: u32,
}

impl PassStats {
    /// Cells that still need a brick
    pub fn misses(&self) -> u32 {
        self.requested + self.dropped
    }
}

/// Snapshot of the GPU index buffer, as a dispatch would see it
pub struct ConsumerPass {
    grid: Grid,
    entries: Vec<u32>,
}

impl ConsumerPass {
    /// Download the index buffer in full
    pub fn capture<B: GpuBuffer>(table: &IndexTable<B>) -> Result<Self> {
        let grid = *table.grid();
        let mut bytes = vec![0u8; grid.cell_count() * ENTRY_SIZE as usize];
        table.buffer().download(0, &mut bytes)?;

        let entries = bytes
            .chunks_exact(ENTRY_SIZE as usize)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Self { grid, entries })
    }

    /// Decode the entry for `cell`
    pub fn resolve(&self, cell: IVec3) -> Result<CellState> {
        let index = self.grid.index_of(cell).ok_or(Error::CellOutOfBounds(cell))?;
        CellState::decode(self.entries[index])
    }

    /// Look up `cell` and request it if missing
    pub fn visit<B: GpuBuffer>(&self, queue: &mut BrickRequestQueue<B>, cell: IVec3) -> Result<Visit> {
        Ok(match self.resolve(cell)? {
            CellState::Resident { slot } => Visit::Hit { slot },
            CellState::Empty => Visit::Empty,
            CellState::Unloaded => {
                if queue.enqueue(cell)? {
                    Visit::Requested
                } else {
                    Visit::Dropped
                }
            }
        })
    }

    /// Visit a batch of cells, the way one dispatch touches many cells.
    ///
    /// Misses are appended to the queue in one batch, so a pass costs one
    /// counter readback however many cells it touches.
    pub fn visit_all<B, I>(&self, queue: &mut BrickRequestQueue<B>, cells: I) -> Result<PassStats>
    where
        B: GpuBuffer,
        I: IntoIterator<Item = IVec3>,
    {
        let mut stats = PassStats::default();
        let mut misses = Vec::new();
        for cell in cells {
            match self.resolve(cell)? {
                CellState::Resident { .. } => stats.hits += 1,
                CellState::Empty => stats.empty += 1,
                CellState::Unloaded => misses.push(cell),
            }
        }

        stats.requested = queue.enqueue_batch(&misses)?;
        stats.dropped = misses.len() as u32 - stats.requested;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::buffer::{HostAllocator, HostBuffer};
    use glam::UVec3;

    #[test]
    fn test_pass_sees_gpu_state() {
        let grid = Grid::new(UVec3::new(2, 2, 1));
        let mut table: IndexTable<HostBuffer> = IndexTable::new(&HostAllocator, grid).unwrap();
        let mut queue: BrickRequestQueue<HostBuffer> = BrickRequestQueue::new(&HostAllocator, 1).unwrap();

        table.mark_resident(IVec3::new(0, 0, 0), 3).unwrap();
        table.mark_empty(IVec3::new(1, 0, 0)).unwrap();

        let pass = ConsumerPass::capture(&table).unwrap();
        assert_eq!(pass.visit(&mut queue, IVec3::new(0, 0, 0)).unwrap(), Visit::Hit { slot: 3 });
        assert_eq!(pass.visit(&mut queue, IVec3::new(1, 0, 0)).unwrap(), Visit::Empty);
        assert_eq!(pass.visit(&mut queue, IVec3::new(0, 1, 0)).unwrap(), Visit::Requested);
        assert_eq!(pass.visit(&mut queue, IVec3::new(1, 1, 0)).unwrap(), Visit::Dropped);

        let drain = queue.drain_all().unwrap();
        assert_eq!(drain.cells, vec![IVec3::new(0, 1, 0)]);
        assert_eq!(drain.dropped(), 1);
    }

    #[test]
    fn test_visit_all_counts() {
        let grid = Grid::new(UVec3::splat(2));
        let table: IndexTable<HostBuffer> = IndexTable::new(&HostAllocator, grid).unwrap();
        let mut queue: BrickRequestQueue<HostBuffer> = BrickRequestQueue::new(&HostAllocator, 5).unwrap();

        let pass = ConsumerPass::capture(&table).unwrap();
        let stats = pass.visit_all(&mut queue, grid.cells()).unwrap();
        assert_eq!(stats, PassStats { hits: 0, empty: 0, requested: 5, dropped: 3 });
        assert_eq!(stats.misses(), 8);
    }

    #[test]
    fn test_visit_all_reads_counter_once() {
        let grid = Grid::new(UVec3::new(4, 2, 2));
        let mut table: IndexTable<HostBuffer> = IndexTable::new(&HostAllocator, grid).unwrap();
        let mut queue: BrickRequestQueue<HostBuffer> = BrickRequestQueue::new(&HostAllocator, 32).unwrap();
        table.mark_empty(IVec3::new(0, 0, 0)).unwrap();
        table.mark_resident(IVec3::new(1, 0, 0), 0).unwrap();

        let before = queue.buffer().upload_count();
        let pass = ConsumerPass::capture(&table).unwrap();
        let stats = pass.visit_all(&mut queue, grid.cells()).unwrap();

        assert_eq!(stats, PassStats { hits: 1, empty: 1, requested: 14, dropped: 0 });
        assert_eq!(queue.buffer().upload_count(), before + 2);

        // Requests keep grid order
        let drain = queue.drain_all().unwrap();
        let expected: Vec<IVec3> = grid.cells().skip(2).collect();
        assert_eq!(drain.cells, expected);
    }

    #[test]
    fn test_zeroed_entry_is_rejected() {
        let pass = ConsumerPass { grid: Grid::new(UVec3::ONE), entries: vec![0] };
        assert!(matches!(pass.resolve(IVec3::ZERO), Err(Error::InvalidIndexTag(0))));
        assert!(pass.resolve(IVec3::ONE).is_err());
    }
}
