//! # Block Module
//!
//! Block type definitions, block face handling, and the texture-atlas lookup that maps a
//! (block type, face) pair to a UV rectangle.

use cgmath::Vector2;
use serde::{Deserialize, Serialize};

use block_side::BlockSide;
use block_type::BlockType;

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block types in memory.
pub type BlockTypeSize = u8;

/// Atlas coordinates of one block type's six faces.
///
/// `faces` is ordered like `BlockSide::all()`: +Y, -Y, +Z, -Z, +X, -X. Each entry is the
/// `[column, row]` of a sub-image, with row 0 at the top of the atlas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockTextures {
    /// Human-readable name, only used in settings files.
    pub name: String,
    /// Atlas `[column, row]` per face.
    pub faces: [[u32; 2]; 6],
}

impl BlockTextures {
    fn uniform(name: &str, tile: [u32; 2]) -> Self {
        Self {
            name: name.to_string(),
            faces: [tile; 6],
        }
    }
}

/// Per-block-type atlas coordinates, indexed by `BlockTypeSize`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockTextureTable {
    entries: Vec<BlockTextures>,
}

impl Default for BlockTextureTable {
    fn default() -> Self {
        Self {
            entries: vec![
                BlockTextures::uniform("air", [0, 0]),
                BlockTextures::uniform("stone", [1, 0]),
                BlockTextures::uniform("dirt", [2, 0]),
                BlockTextures {
                    name: "grass".to_string(),
                    faces: [[3, 0], [2, 0], [4, 0], [4, 0], [4, 0], [4, 0]],
                },
                BlockTextures {
                    name: "wood".to_string(),
                    faces: [[6, 0], [6, 0], [5, 0], [5, 0], [5, 0], [5, 0]],
                },
                BlockTextures::uniform("leaves", [7, 0]),
            ],
        }
    }
}

impl BlockTextureTable {
    /// Creates a table from explicit entries.
    pub fn new(entries: Vec<BlockTextures>) -> Self {
        Self { entries }
    }

    /// Atlas coordinate of `side` of `block_type`. Unknown block types use tile (0, 0).
    pub fn atlas_coord(&self, block_type: BlockTypeSize, side: BlockSide) -> [u32; 2] {
        self.entries
            .get(block_type as usize)
            .map(|entry| entry.faces[side as usize])
            .unwrap_or([0, 0])
    }

    /// UVs of the four quad corners for `side` of `block_type`.
    ///
    /// The corners are returned in the order the cubical mesher emits face vertices.
    ///
    /// # Arguments
    /// * `atlas_size_in_blocks` - Sub-images per atlas row
    pub fn face_uvs(
        &self,
        block_type: BlockTypeSize,
        side: BlockSide,
        atlas_size_in_blocks: u32,
    ) -> [Vector2<f32>; 4] {
        let [column, row] = self.atlas_coord(block_type, side);
        let tile = 1.0 / atlas_size_in_blocks.max(1) as f32;
        let u = column as f32 * tile;
        let v = 1.0 - (row as f32 + 1.0) * tile;
        [
            Vector2::new(u, v + tile),
            Vector2::new(u + tile, v + tile),
            Vector2::new(u + tile, v),
            Vector2::new(u, v),
        ]
    }
}

impl From<BlockType> for BlockTypeSize {
    fn from(block_type: BlockType) -> Self {
        block_type.as_int()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_grass_uses_distinct_top_and_side_tiles() {
        let table = BlockTextureTable::default();
        let grass = BlockType::GRASS.as_int();
        assert_eq!(table.atlas_coord(grass, BlockSide::TOP), [3, 0]);
        assert_eq!(table.atlas_coord(grass, BlockSide::BOTTOM), [2, 0]);
        assert_eq!(table.atlas_coord(grass, BlockSide::LEFT), [4, 0]);
    }

    #[test]
    fn test_uv_rect_covers_one_tile() {
        let table = BlockTextureTable::default();
        let uvs = table.face_uvs(BlockType::STONE.as_int(), BlockSide::TOP, 4);
        assert!((uvs[0].x - 0.25).abs() < EPSILON);
        assert!((uvs[0].y - 1.0).abs() < EPSILON);
        assert!((uvs[2].x - 0.5).abs() < EPSILON);
        assert!((uvs[2].y - 0.75).abs() < EPSILON);
    }

    #[test]
    fn test_unknown_block_type_falls_back_to_first_tile() {
        let table = BlockTextureTable::default();
        assert_eq!(table.atlas_coord(200, BlockSide::FRONT), [0, 0]);
    }
}
