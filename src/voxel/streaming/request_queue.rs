//! Brick Request Queue - GPU->CPU channel for missing bricks
//!
//! When rays hit an unloaded cell they append its grid coordinate to a
//! request buffer and bump a counter. Once per frame the CPU reads the
//! counter, clamps it to the queue capacity, reads that many entries and
//! resets the counter to zero.
//!
//! Buffer layout (little-endian):
//! ```text
//! offset 0   count:    u32
//! offset 4   capacity: u32
//! offset 8   reserved: u32 x 2
//! offset 16  entries:  [i32; 4] x capacity   (x, y, z, unused)
//! ```
//!
//! The counter keeps growing past capacity so overflow is visible, but
//! entries past capacity are never written. Dropped requests are recovered
//! by the consumer asking again on its next pass.

use bytemuck::{Pod, Zeroable};
use glam::IVec3;

use crate::core::{Error, Result};
use crate::render::buffer::{BufferAllocator, GpuBuffer};

/// Default requests per frame
pub const MAX_REQUESTS_PER_FRAME: u32 = 1024;

/// Queue header as stored at the start of the buffer
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct LoadQueueHeader {
    pub count: u32,
    pub capacity: u32,
    pub _reserved: [u32; 2],
}

/// One request entry, padded to 16 bytes for vec4 alignment
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct QueueEntry {
    pub cell: [i32; 4],
}

impl QueueEntry {
    pub fn new(cell: IVec3) -> Self {
        Self { cell: [cell.x, cell.y, cell.z, 0] }
    }

    pub fn cell(&self) -> IVec3 {
        IVec3::new(self.cell[0], self.cell[1], self.cell[2])
    }
}

pub const HEADER_SIZE: u64 = std::mem::size_of::<LoadQueueHeader>() as u64;
pub const ENTRY_SIZE: u64 = std::mem::size_of::<QueueEntry>() as u64;

/// Requests collected by one drain
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Drain {
    /// Cells in the order they were enqueued, at most `capacity`
    pub cells: Vec<IVec3>,
    /// Raw counter value seen at drain time
    pub observed: u32,
    /// Queue capacity
    pub capacity: u32,
}

impl Drain {
    /// True if more requests arrived than the queue holds
    pub fn overflowed(&self) -> bool {
        self.observed > self.capacity
    }

    /// Requests lost to the capacity clamp
    pub fn dropped(&self) -> u32 {
        self.observed.saturating_sub(self.capacity)
    }
}

/// Bounded request channel shared with the GPU
pub struct BrickRequestQueue<B: GpuBuffer> {
    buffer: B,
    capacity: u32,
    /// Completed drain cycles
    drains: u64,
}

impl<B: GpuBuffer> BrickRequestQueue<B> {
    /// Create an empty queue holding up to `capacity` requests per frame
    pub fn new<A>(allocator: &A, capacity: u32) -> Result<Self>
    where
        A: BufferAllocator<Buffer = B>,
    {
        if capacity == 0 {
            return Err(Error::Config("load queue capacity must be at least 1".to_string()));
        }

        let size = HEADER_SIZE + capacity as u64 * ENTRY_SIZE;
        let mut buffer = allocator.create_buffer("brick_request_queue", size)?;

        let header = LoadQueueHeader { count: 0, capacity, _reserved: [0; 2] };
        buffer.upload(0, bytemuck::bytes_of(&header))?;

        Ok(Self { buffer, capacity, drains: 0 })
    }

    /// Append a request the way the raycast shader does.
    ///
    /// Increments the counter unconditionally and writes the entry only when
    /// the previous count was below capacity. Returns false if the request was
    /// dropped.
    pub fn enqueue(&mut self, cell: IVec3) -> Result<bool> {
        let index = self.read_count()?;
        self.write_count(index.saturating_add(1))?;

        if index >= self.capacity {
            return Ok(false);
        }

        let entry = QueueEntry::new(cell);
        self.buffer.upload(Self::entry_offset(index), bytemuck::bytes_of(&entry))?;
        Ok(true)
    }

    /// Append many requests with one counter read, one entry upload and one
    /// counter write.
    ///
    /// Equivalent to calling `enqueue` for each cell in order. Returns how
    /// many were accepted; the rest were dropped.
    pub fn enqueue_batch(&mut self, cells: &[IVec3]) -> Result<u32> {
        if cells.is_empty() {
            return Ok(0);
        }

        let start = self.read_count()?;
        let requested = u32::try_from(cells.len()).unwrap_or(u32::MAX);
        let accepted = self.capacity.saturating_sub(start).min(requested);

        if accepted > 0 {
            let entries: Vec<QueueEntry> = cells[..accepted as usize]
                .iter()
                .map(|&cell| QueueEntry::new(cell))
                .collect();
            self.buffer.upload(Self::entry_offset(start), bytemuck::cast_slice(&entries))?;
        }
        self.write_count(start.saturating_add(requested))?;

        Ok(accepted)
    }

    /// Read every pending request and reset the counter.
    ///
    /// The counter is clamped to capacity before any entry is read; entries
    /// past the clamp are discarded for this cycle.
    pub fn drain_all(&mut self) -> Result<Drain> {
        let observed = self.read_count()?;
        let count = observed.min(self.capacity);

        let mut cells = Vec::with_capacity(count as usize);
        if count > 0 {
            let mut bytes = vec![0u8; (count as u64 * ENTRY_SIZE) as usize];
            self.buffer.download(HEADER_SIZE, &mut bytes)?;

            for chunk in bytes.chunks_exact(ENTRY_SIZE as usize) {
                let entry: QueueEntry = bytemuck::pod_read_unaligned(chunk);
                cells.push(entry.cell());
            }
        }

        self.write_count(0)?;
        self.drains += 1;

        if observed > 0 {
            log::trace!("Brick requests: {} observed, {} read", observed, count);
        }

        Ok(Drain { cells, observed, capacity: self.capacity })
    }

    /// Counter value currently in the buffer
    pub fn pending_count(&self) -> Result<u32> {
        self.read_count()
    }

    /// Maximum requests read per drain
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Completed drain cycles
    pub fn drain_cycles(&self) -> u64 {
        self.drains
    }

    /// GPU buffer the raycaster writes into
    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    fn entry_offset(index: u32) -> u64 {
        HEADER_SIZE + index as u64 * ENTRY_SIZE
    }

    fn read_count(&self) -> Result<u32> {
        let mut raw = [0u8; 4];
        self.buffer.download(0, &mut raw)?;
        Ok(u32::from_le_bytes(raw))
    }

    fn write_count(&mut self, count: u32) -> Result<()> {
        self.buffer.upload(0, &count.to_le_bytes())
    }
}
