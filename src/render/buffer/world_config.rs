//! World configuration block shared with the raycaster

use bytemuck::{Pod, Zeroable};
use glam::UVec3;

/// World config as the GPU sees it (16 bytes, matches the WGSL `WorldConfig`)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuWorldConfig {
    /// Grid dimensions in cells
    pub grid_dims: [i32; 3],
    /// Voxels along each brick axis
    pub voxels_per_brick_axis: i32,
}

impl GpuWorldConfig {
    /// Byte size of the block
    pub const SIZE: u64 = std::mem::size_of::<GpuWorldConfig>() as u64;

    pub fn new(grid_dims: UVec3, brick_size: u32) -> Self {
        Self {
            grid_dims: grid_dims.as_ivec3().to_array(),
            voxels_per_brick_axis: brick_size as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        assert_eq!(std::mem::size_of::<GpuWorldConfig>(), 16);
    }

    #[test]
    fn test_layout() {
        let cfg = GpuWorldConfig::new(UVec3::new(4, 5, 6), 8);
        let words: &[i32] = bytemuck::cast_slice(bytemuck::bytes_of(&cfg));
        assert_eq!(words, &[4, 5, 6, 8]);
    }
}
