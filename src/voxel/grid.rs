//! Coarse grid of brick-sized cells covering the world

use glam::{IVec3, UVec3};

/// 3D lattice of cells, fixed at world creation.
///
/// Cells are linearized x-fastest: `x + y * Gx + z * Gx * Gy`. The same order
/// is used by the index table buffer, so the GPU can compute it directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid {
    dims: UVec3,
}

impl Grid {
    pub fn new(dims: UVec3) -> Self {
        Self { dims }
    }

    /// Grid dimensions in cells
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    /// Total number of cells
    pub fn cell_count(&self) -> usize {
        self.dims.x as usize * self.dims.y as usize * self.dims.z as usize
    }

    /// Whether `cell` lies inside the grid
    pub fn contains(&self, cell: IVec3) -> bool {
        cell.cmpge(IVec3::ZERO).all()
            && (cell.x as u32) < self.dims.x
            && (cell.y as u32) < self.dims.y
            && (cell.z as u32) < self.dims.z
    }

    /// Linear index of a cell, or None if outside the grid
    pub fn index_of(&self, cell: IVec3) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let (x, y, z) = (cell.x as usize, cell.y as usize, cell.z as usize);
        let (gx, gy) = (self.dims.x as usize, self.dims.y as usize);
        Some(x + y * gx + z * gx * gy)
    }

    /// Cell coordinate for a linear index
    pub fn coord_of(&self, index: usize) -> IVec3 {
        let (gx, gy) = (self.dims.x as usize, self.dims.y as usize);
        IVec3::new(
            (index % gx) as i32,
            ((index / gx) % gy) as i32,
            (index / (gx * gy)) as i32,
        )
    }

    /// All cells in linear order
    pub fn cells(&self) -> impl Iterator<Item = IVec3> + use<> {
        let grid = *self;
        (0..grid.cell_count()).map(move |i| grid.coord_of(i))
    }

    /// Voxel-space minimum corner of a cell
    pub fn voxel_origin(cell: IVec3, brick_size: u32) -> IVec3 {
        cell * brick_size as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_linear_order() {
        let grid = Grid::new(UVec3::new(4, 3, 2));
        assert_eq!(grid.cell_count(), 24);
        assert_eq!(grid.index_of(IVec3::new(0, 0, 0)), Some(0));
        assert_eq!(grid.index_of(IVec3::new(1, 0, 0)), Some(1));
        assert_eq!(grid.index_of(IVec3::new(0, 1, 0)), Some(4));
        assert_eq!(grid.index_of(IVec3::new(0, 0, 1)), Some(12));
        assert_eq!(grid.index_of(IVec3::new(3, 2, 1)), Some(23));

        for (i, cell) in grid.cells().enumerate() {
            assert_eq!(grid.index_of(cell), Some(i));
        }
    }

    #[test]
    fn test_out_of_bounds() {
        let grid = Grid::new(UVec3::splat(4));
        assert!(grid.index_of(IVec3::new(-1, 0, 0)).is_none());
        assert!(grid.index_of(IVec3::new(4, 0, 0)).is_none());
        assert!(grid.index_of(IVec3::new(0, 0, 4)).is_none());
        assert!(grid.contains(IVec3::new(3, 3, 3)));
    }

    #[test]
    fn test_voxel_origin() {
        assert_eq!(Grid::voxel_origin(IVec3::new(1, 2, 3), 8), IVec3::new(8, 16, 24));
    }
}
