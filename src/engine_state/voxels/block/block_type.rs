//! # Block Type Module
//!
//! This module defines the different types of blocks in the voxel world and the conversion
//! between the rich enum and the compact byte stored in block grids.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::BlockTypeSize;

/// Enumerates all block types in the voxel world.
///
/// The discriminants are the bytes stored in a `VoxelGrid`. Zero is air; every other value
/// is solid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlockType {
    /// Empty space. Transparent.
    AIR = 0,

    /// Solid ground below the surface.
    STONE = 1,

    /// The topmost ground block of a column.
    DIRT = 2,

    /// A surface block on a column with enough vegetation. Also the default placed block.
    GRASS = 3,

    /// Tree trunk.
    WOOD = 4,

    /// Tree canopy.
    LEAVES = 5,
}

/// Number of block types, including air.
pub const NUM_BLOCK_TYPES: usize = 6;

impl BlockType {
    /// Converts a stored byte back into a `BlockType`.
    ///
    /// # Returns
    /// `None` for bytes that do not name a known block type.
    pub fn from_int(btype: BlockTypeSize) -> Option<Self> {
        FromPrimitive::from_u8(btype)
    }

    /// The byte stored in block grids for this type.
    pub fn as_int(self) -> BlockTypeSize {
        self as BlockTypeSize
    }

    /// Whether light and visibility pass through this block.
    pub fn is_transparent(self) -> bool {
        self == BlockType::AIR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_conversion_matches_discriminants() {
        for value in 0..NUM_BLOCK_TYPES as BlockTypeSize {
            let block = BlockType::from_int(value).expect("every value below the count is a block");
            assert_eq!(block.as_int(), value);
        }
        assert_eq!(BlockType::from_int(NUM_BLOCK_TYPES as BlockTypeSize), None);
    }

    #[test]
    fn test_only_air_is_transparent() {
        assert!(BlockType::AIR.is_transparent());
        assert!(!BlockType::STONE.is_transparent());
        assert!(!BlockType::LEAVES.is_transparent());
    }
}
