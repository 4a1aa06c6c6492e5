//! # Voxel Grid
//!
//! Dense block storage for one chunk, border ring included.
//!
//! Alongside the block bytes the grid keeps a bit per cell telling whether the cell is
//! solid, so the mesher's exposure test never has to decode block types.

use bitvec::prelude::BitVec;
use cgmath::Point3;

use super::block::{block_type::BlockType, BlockTypeSize};

/// A `width` x `height` x `width` array of block bytes.
///
/// Cells are stored x first, then z, then y. Reads outside the grid return air and
/// writes outside the grid are ignored.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelGrid {
    width: i32,
    height: i32,
    blocks: Vec<BlockTypeSize>,
    solid: BitVec,
}

impl VoxelGrid {
    /// Creates a grid filled with air.
    pub fn new(width: i32, height: i32) -> Self {
        let len = (width.max(0) * width.max(0) * height.max(0)) as usize;
        Self {
            width: width.max(0),
            height: height.max(0),
            blocks: vec![BlockType::AIR.as_int(); len],
            solid: BitVec::repeat(false, len),
        }
    }

    /// Cells along x and along z.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Cells along y.
    pub fn height(&self) -> i32 {
        self.height
    }

    fn index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        if x < 0 || y < 0 || z < 0 || x >= self.width || y >= self.height || z >= self.width {
            return None;
        }
        Some((x + z * self.width + y * self.width * self.width) as usize)
    }

    /// The block at `(x, y, z)`, or air outside the grid.
    pub fn get(&self, x: i32, y: i32, z: i32) -> BlockTypeSize {
        self.index(x, y, z)
            .map(|i| self.blocks[i])
            .unwrap_or(BlockType::AIR.as_int())
    }

    /// Writes `block` at `(x, y, z)`.
    ///
    /// # Returns
    /// `false` if the position lies outside the grid and nothing was written.
    pub fn set(&mut self, x: i32, y: i32, z: i32, block: BlockTypeSize) -> bool {
        match self.index(x, y, z) {
            Some(i) => {
                self.blocks[i] = block;
                self.solid.set(i, block != BlockType::AIR.as_int());
                true
            }
            None => false,
        }
    }

    /// `set` addressed by a grid point.
    pub fn set_at(&mut self, grid: Point3<i32>, block: BlockTypeSize) -> bool {
        self.set(grid.x, grid.y, grid.z, block)
    }

    /// Whether the cell holds a non-air block. Cells outside the grid are not solid.
    pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        self.index(x, y, z).map(|i| self.solid[i]).unwrap_or(false)
    }

    /// Number of solid cells.
    pub fn count_solid(&self) -> usize {
        self.solid.count_ones()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_outside_the_grid_are_air() {
        let grid = VoxelGrid::new(4, 3);
        for (x, y, z) in [(-1, 0, 0), (0, -1, 0), (0, 0, -1), (4, 0, 0), (0, 3, 0), (0, 0, 4)] {
            assert_eq!(grid.get(x, y, z), BlockType::AIR.as_int());
            assert!(!grid.is_solid(x, y, z));
        }
    }

    #[test]
    fn test_set_tracks_solidity() {
        let mut grid = VoxelGrid::new(4, 3);
        assert!(grid.set(1, 2, 3, BlockType::STONE.as_int()));
        assert!(grid.is_solid(1, 2, 3));
        assert_eq!(grid.count_solid(), 1);

        assert!(grid.set(1, 2, 3, BlockType::AIR.as_int()));
        assert!(!grid.is_solid(1, 2, 3));
        assert_eq!(grid.count_solid(), 0);

        assert!(!grid.set(9, 0, 0, BlockType::STONE.as_int()));
    }

    #[test]
    fn test_cells_are_independent() {
        let mut grid = VoxelGrid::new(3, 3);
        grid.set(2, 0, 1, BlockType::DIRT.as_int());
        for y in 0..3 {
            for z in 0..3 {
                for x in 0..3 {
                    let expected = (x, y, z) == (2, 0, 1);
                    assert_eq!(grid.is_solid(x, y, z), expected, "cell ({x}, {y}, {z})");
                }
            }
        }
    }
}
