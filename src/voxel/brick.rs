//! Bit-packed occupancy bricks
//!
//! A brick is a cube of `M` voxels per axis stored as one bit per voxel.
//! Voxel `(x, y, z)` has bit index `x + y*M + z*M*M`, which lands in word
//! `i / 32` at bit `i % 32`. The raycaster decodes bricks with the same
//! arithmetic, so this layout is part of the GPU contract.

use glam::UVec3;

/// Bits per packed word
pub const WORD_BITS: u32 = 32;

/// Largest supported brick edge (32³ voxels = 1024 words)
pub const MAX_BRICK_SIZE: u32 = 32;

/// Shape of a brick and its packed size
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BrickLayout {
    size: u32,
}

impl BrickLayout {
    /// Layout for cubic bricks of `size` voxels per axis
    pub fn new(size: u32) -> Self {
        debug_assert!((1..=MAX_BRICK_SIZE).contains(&size));
        Self { size }
    }

    /// Voxels per axis
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Voxel extent as a vector
    pub fn extent(&self) -> UVec3 {
        UVec3::splat(self.size)
    }

    /// Voxels per brick
    pub fn voxel_count(&self) -> usize {
        (self.size * self.size * self.size) as usize
    }

    /// Packed words per brick
    pub fn word_count(&self) -> usize {
        self.voxel_count().div_ceil(WORD_BITS as usize)
    }

    /// Packed bytes per brick (pool slot stride)
    pub fn byte_size(&self) -> u64 {
        (self.word_count() * std::mem::size_of::<u32>()) as u64
    }

    /// Bit index of a voxel
    #[inline]
    pub fn voxel_index(&self, x: u32, y: u32, z: u32) -> usize {
        debug_assert!(x < self.size && y < self.size && z < self.size);
        (x + y * self.size + z * self.size * self.size) as usize
    }
}

impl Default for BrickLayout {
    fn default() -> Self {
        Self::new(8)
    }
}

/// Packed occupancy mask for one brick
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BrickMask {
    layout: BrickLayout,
    words: Vec<u32>,
}

impl BrickMask {
    /// Mask with no solid voxels
    pub fn empty(layout: BrickLayout) -> Self {
        Self {
            layout,
            words: vec![0; layout.word_count()],
        }
    }

    /// Rebuild a mask from packed words (e.g. read back from the pool buffer)
    pub fn from_words(layout: BrickLayout, words: Vec<u32>) -> Option<Self> {
        if words.len() != layout.word_count() {
            return None;
        }
        Some(Self { layout, words })
    }

    pub fn layout(&self) -> BrickLayout {
        self.layout
    }

    /// Whether voxel is solid
    pub fn get(&self, x: u32, y: u32, z: u32) -> bool {
        let i = self.layout.voxel_index(x, y, z);
        self.words[i / WORD_BITS as usize] & (1 << (i % WORD_BITS as usize)) != 0
    }

    /// Set voxel occupancy
    pub fn set(&mut self, x: u32, y: u32, z: u32, solid: bool) {
        let i = self.layout.voxel_index(x, y, z);
        let word = &mut self.words[i / WORD_BITS as usize];
        let bit = 1u32 << (i % WORD_BITS as usize);
        if solid {
            *word |= bit;
        } else {
            *word &= !bit;
        }
    }

    /// True if no voxel is solid
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of solid voxels
    pub fn filled_count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Packed words
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Packed bytes as uploaded into a pool slot
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }
}

/// Result of packing a density field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedBrick {
    pub mask: BrickMask,
    /// Solid voxel count
    pub filled: u32,
}

impl EncodedBrick {
    /// True if the field had no solid voxel
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }
}

/// Pack a density field sampled at brick resolution.
///
/// Samples are x-fastest, then y, then z. A voxel is solid when its density
/// is `<= 0`; NaN never compares as solid. Missing trailing samples count as
/// empty.
pub fn encode_density(layout: BrickLayout, samples: &[f32]) -> EncodedBrick {
    debug_assert_eq!(samples.len(), layout.voxel_count());

    let mut words = vec![0u32; layout.word_count()];
    let mut filled = 0;

    for (i, &density) in samples.iter().take(layout.voxel_count()).enumerate() {
        if density <= 0.0 {
            words[i / WORD_BITS as usize] |= 1 << (i % WORD_BITS as usize);
            filled += 1;
        }
    }

    EncodedBrick {
        mask: BrickMask { layout, words },
        filled,
    }
}
