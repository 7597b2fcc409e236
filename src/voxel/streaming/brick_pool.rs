//! Brick Pool - fixed-capacity arena of resident bricks
//!
//! - Capacity and GPU buffer size are fixed at creation
//! - Appending claims the next slot; slots are never reused or moved
//! - Slot `i` lives at byte offset `i * brick_byte_size` in the GPU buffer

use crate::core::{Error, Result};
use crate::render::buffer::{BufferAllocator, GpuBuffer};
use crate::voxel::brick::{BrickLayout, BrickMask};
use crate::voxel::streaming::index_table::MAX_SLOT;

/// Default pool capacity in bricks (64 bytes each at 8³ = 16MB)
pub const DEFAULT_BRICK_POOL_SIZE: u32 = 256 * 1024;

/// CPU-side slots reserved up front; the GPU buffer always holds the full capacity
const CPU_PREALLOC_LIMIT: usize = 64 * 1024;

/// Append-only brick store with a GPU mirror
pub struct BrickPool<B: GpuBuffer> {
    /// GPU buffer for brick data
    buffer: B,
    /// Brick shape shared by every slot
    layout: BrickLayout,
    /// Capacity in number of bricks
    capacity: u32,
    /// CPU copies of resident bricks, index = slot
    bricks: Vec<BrickMask>,
}

impl<B: GpuBuffer> BrickPool<B> {
    /// Create a pool with room for `capacity` bricks
    pub fn new<A>(allocator: &A, layout: BrickLayout, capacity: u32) -> Result<Self>
    where
        A: BufferAllocator<Buffer = B>,
    {
        if capacity == 0 || capacity > MAX_SLOT + 1 {
            return Err(Error::Config(format!(
                "brick pool capacity {} outside 1..={}",
                capacity,
                MAX_SLOT as u64 + 1
            )));
        }

        let buffer_size = capacity as u64 * layout.byte_size();
        let buffer = allocator.create_buffer("brick_pool", buffer_size)?;

        log::info!(
            "Created brick pool: {} slots of {} bytes, {:.1}MB",
            capacity,
            layout.byte_size(),
            buffer_size as f64 / 1024.0 / 1024.0
        );

        Ok(Self {
            buffer,
            layout,
            capacity,
            bricks: Vec::with_capacity((capacity as usize).min(CPU_PREALLOC_LIMIT)),
        })
    }

    /// Claim the next slot for `brick` and upload it.
    ///
    /// Fails with `CapacityExceeded` once every slot is taken; the pool is
    /// left unchanged in that case.
    pub fn append(&mut self, brick: BrickMask) -> Result<u32> {
        if self.is_full() {
            return Err(Error::CapacityExceeded { capacity: self.capacity });
        }
        debug_assert_eq!(brick.layout(), self.layout);

        let slot = self.bricks.len() as u32;
        self.buffer.upload(self.slot_offset(slot), brick.as_bytes())?;
        self.bricks.push(brick);

        log::trace!("Brick appended to slot {}", slot);
        Ok(slot)
    }

    /// Release the most recent append.
    ///
    /// Only the last claimed slot can be released. Its GPU bytes are left in
    /// place and overwritten by the next append.
    pub fn rollback(&mut self, slot: u32) -> Result<BrickMask> {
        if slot.checked_add(1) != Some(self.len()) {
            return Err(Error::InvalidSlot { slot, len: self.len() });
        }
        let brick = self.bricks.pop().ok_or(Error::InvalidSlot { slot, len: 0 })?;
        log::trace!("Brick slot {} released", slot);
        Ok(brick)
    }

    /// Brick stored in `slot`
    pub fn get(&self, slot: u32) -> Result<&BrickMask> {
        self.bricks
            .get(slot as usize)
            .ok_or(Error::InvalidSlot { slot, len: self.len() })
    }

    /// Byte offset of a slot in the GPU buffer
    pub fn slot_offset(&self, slot: u32) -> u64 {
        slot as u64 * self.layout.byte_size()
    }

    /// Read a slot back from the GPU buffer
    pub fn read_back(&self, slot: u32) -> Result<BrickMask> {
        self.get(slot)?;
        let mut bytes = vec![0u8; self.layout.byte_size() as usize];
        self.buffer.download(self.slot_offset(slot), &mut bytes)?;

        let words = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        BrickMask::from_words(self.layout, words)
            .ok_or(Error::InvalidSlot { slot, len: self.len() })
    }

    /// Brick shape
    pub fn layout(&self) -> BrickLayout {
        self.layout
    }

    /// Number of resident bricks
    pub fn len(&self) -> u32 {
        self.bricks.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bricks.is_empty()
    }

    /// True when no slot is left
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Get capacity
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Get pool utilization percentage
    pub fn utilization(&self) -> f32 {
        self.len() as f32 / self.capacity as f32 * 100.0
    }

    /// Get the GPU buffer
    pub fn buffer(&self) -> &B {
        &self.buffer
    }
}
