//! Index Table - per-cell residency state mirrored to the GPU
//!
//! Each grid cell owns one `u32` entry in the GPU index buffer:
//! - bits 0-27: pool slot (meaningful only for resident cells)
//! - bits 28-31: state tag
//!
//! No tag is zero, so a zero-filled buffer never decodes as a valid state
//! and "never written" cannot be confused with "resolved empty".

use glam::IVec3;

use crate::core::{Error, Result};
use crate::render::buffer::{BufferAllocator, GpuBuffer};
use crate::voxel::grid::Grid;

/// Bits reserved for the slot index
pub const SLOT_BITS: u32 = 28;
/// Mask selecting the slot index
pub const SLOT_MASK: u32 = (1 << SLOT_BITS) - 1;
/// Largest encodable slot
pub const MAX_SLOT: u32 = SLOT_MASK;

/// Cell has not been resolved yet
pub const TAG_UNLOADED: u32 = 0b0001;
/// Cell was generated and holds no solid voxel
pub const TAG_EMPTY: u32 = 0b0010;
/// Cell is resident in the brick pool
pub const TAG_RESIDENT: u32 = 0b0100;

/// Byte size of one entry
pub const ENTRY_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// Residency state of a grid cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CellState {
    #[default]
    Unloaded,
    Empty,
    Resident { slot: u32 },
}

impl CellState {
    /// True once the cell no longer needs generating
    pub fn is_resolved(&self) -> bool {
        !matches!(self, CellState::Unloaded)
    }

    /// Pack into the GPU entry format
    pub fn encode(self) -> u32 {
        match self {
            CellState::Unloaded => TAG_UNLOADED << SLOT_BITS,
            CellState::Empty => TAG_EMPTY << SLOT_BITS,
            CellState::Resident { slot } => {
                debug_assert!(slot <= MAX_SLOT);
                (TAG_RESIDENT << SLOT_BITS) | (slot & SLOT_MASK)
            }
        }
    }

    /// Unpack a GPU entry
    pub fn decode(raw: u32) -> Result<Self> {
        match raw >> SLOT_BITS {
            TAG_UNLOADED => Ok(CellState::Unloaded),
            TAG_EMPTY => Ok(CellState::Empty),
            TAG_RESIDENT => Ok(CellState::Resident { slot: raw & SLOT_MASK }),
            _ => Err(Error::InvalidIndexTag(raw)),
        }
    }
}

/// Grid-to-pool index with a CPU mirror and a GPU copy
pub struct IndexTable<B: GpuBuffer> {
    grid: Grid,
    /// CPU mirror, the source of truth
    entries: Vec<CellState>,
    /// GPU copy read by the raycaster
    buffer: B,
    resident: u32,
    empty: u32,
}

impl<B: GpuBuffer> IndexTable<B> {
    /// Create a table with every cell unloaded and upload it in full
    pub fn new<A>(allocator: &A, grid: Grid) -> Result<Self>
    where
        A: BufferAllocator<Buffer = B>,
    {
        let count = grid.cell_count();
        let mut buffer = allocator.create_buffer("brick_index_table", count as u64 * ENTRY_SIZE)?;

        let raw = vec![CellState::Unloaded.encode(); count];
        buffer.upload(0, bytemuck::cast_slice(&raw))?;

        Ok(Self {
            grid,
            entries: vec![CellState::Unloaded; count],
            buffer,
            resident: 0,
            empty: 0,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Current state of a cell
    pub fn lookup(&self, cell: IVec3) -> Result<CellState> {
        let index = self.index_of(cell)?;
        Ok(self.entries[index])
    }

    /// Record that a cell has no solid voxels
    pub fn mark_empty(&mut self, cell: IVec3) -> Result<()> {
        self.write(cell, CellState::Empty)
    }

    /// Record that a cell lives in pool slot `slot`
    pub fn mark_resident(&mut self, cell: IVec3, slot: u32) -> Result<()> {
        if slot > MAX_SLOT {
            return Err(Error::InvalidSlot { slot, len: MAX_SLOT + 1 });
        }
        self.write(cell, CellState::Resident { slot })
    }

    fn write(&mut self, cell: IVec3, state: CellState) -> Result<()> {
        let index = self.index_of(cell)?;

        // Upload first so a transport failure leaves the mirror untouched
        let raw = state.encode();
        self.buffer.upload(index as u64 * ENTRY_SIZE, bytemuck::bytes_of(&raw))?;

        let previous = std::mem::replace(&mut self.entries[index], state);
        match previous {
            CellState::Resident { .. } => self.resident -= 1,
            CellState::Empty => self.empty -= 1,
            CellState::Unloaded => {}
        }
        match state {
            CellState::Resident { .. } => self.resident += 1,
            CellState::Empty => self.empty += 1,
            CellState::Unloaded => {}
        }

        log::trace!("Index {:?} -> {:?} ({:#010x})", cell, state, raw);
        Ok(())
    }

    fn index_of(&self, cell: IVec3) -> Result<usize> {
        self.grid.index_of(cell).ok_or(Error::CellOutOfBounds(cell))
    }

    /// Iterate `(cell, state)` in linear order
    pub fn iter(&self) -> impl Iterator<Item = (IVec3, CellState)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, state)| (self.grid.coord_of(i), *state))
    }

    /// Number of resident cells
    pub fn resident_count(&self) -> u32 {
        self.resident
    }

    /// Number of cells resolved as empty
    pub fn empty_count(&self) -> u32 {
        self.empty
    }

    /// Number of cells still waiting to be resolved
    pub fn unloaded_count(&self) -> u32 {
        self.entries.len() as u32 - self.resident - self.empty
    }

    /// GPU copy of the table
    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Read one entry back from the GPU copy and decode it
    pub fn read_back(&self, cell: IVec3) -> Result<CellState> {
        let index = self.index_of(cell)?;
        let mut raw = [0u8; ENTRY_SIZE as usize];
        self.buffer.download(index as u64 * ENTRY_SIZE, &mut raw)?;
        CellState::decode(u32::from_le_bytes(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::buffer::{HostAllocator, HostBuffer};
    use glam::UVec3;

    fn table() -> IndexTable<HostBuffer> {
        IndexTable::new(&HostAllocator, Grid::new(UVec3::new(4, 4, 4))).unwrap()
    }

    #[test]
    fn test_tags_are_disjoint_and_nonzero() {
        let tags = [TAG_UNLOADED, TAG_EMPTY, TAG_RESIDENT];
        for (i, a) in tags.iter().enumerate() {
            assert_ne!(*a, 0);
            assert!(*a < 16);
            for b in &tags[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let states = [
            CellState::Unloaded,
            CellState::Empty,
            CellState::Resident { slot: 0 },
            CellState::Resident { slot: 1 },
            CellState::Resident { slot: 9 },
            CellState::Resident { slot: MAX_SLOT - 1 },
            CellState::Resident { slot: MAX_SLOT },
        ];
        for state in states {
            assert_eq!(CellState::decode(state.encode()).unwrap(), state);
        }
    }

    #[test]
    fn test_encoded_values() {
        assert_eq!(CellState::Unloaded.encode(), 0x1000_0000);
        assert_eq!(CellState::Empty.encode(), 0x2000_0000);
        assert_eq!(CellState::Resident { slot: 5 }.encode(), 0x4000_0005);
        assert_eq!(CellState::Resident { slot: MAX_SLOT }.encode(), 0x4FFF_FFFF);
    }

    #[test]
    fn test_decode_rejects_unknown_tags() {
        assert!(matches!(CellState::decode(0), Err(Error::InvalidIndexTag(0))));
        assert!(CellState::decode(0x3000_0000).is_err());
        assert!(CellState::decode(0x8000_0001).is_err());
        assert!(CellState::decode(0xFFFF_FFFF).is_err());
    }

    #[test]
    fn test_new_table_is_unloaded_on_gpu() {
        let table = table();
        let words: Vec<u32> = table
            .buffer()
            .as_bytes()
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(words.len(), 64);
        assert!(words.iter().all(|&w| w == CellState::Unloaded.encode()));
        assert_eq!(table.unloaded_count(), 64);
    }

    #[test]
    fn test_marks_upload_single_entry() {
        let mut table = table();
        let before = table.buffer().upload_count();

        let cell = IVec3::new(1, 2, 3);
        table.mark_resident(cell, 7).unwrap();
        assert_eq!(table.buffer().upload_count(), before + 1);
        assert_eq!(table.buffer().uploaded_bytes() - 64 * 4, 4);

        assert_eq!(table.lookup(cell).unwrap(), CellState::Resident { slot: 7 });
        assert_eq!(table.read_back(cell).unwrap(), CellState::Resident { slot: 7 });

        let other = IVec3::new(3, 0, 0);
        table.mark_empty(other).unwrap();
        assert_eq!(table.read_back(other).unwrap(), CellState::Empty);

        assert_eq!(table.resident_count(), 1);
        assert_eq!(table.empty_count(), 1);
        assert_eq!(table.unloaded_count(), 62);
    }

    #[test]
    fn test_out_of_bounds_cell() {
        let mut table = table();
        let cell = IVec3::new(4, 0, 0);
        assert!(matches!(table.lookup(cell), Err(Error::CellOutOfBounds(_))));
        assert!(table.mark_empty(cell).is_err());
        assert_eq!(table.empty_count(), 0);
    }

    #[test]
    fn test_slot_overflow_rejected() {
        let mut table = table();
        assert!(table.mark_resident(IVec3::ZERO, MAX_SLOT + 1).is_err());
        assert_eq!(table.lookup(IVec3::ZERO).unwrap(), CellState::Unloaded);
    }
}
