//! # Block Side Module
//!
//! This module defines the six faces of a voxel block, the neighbour each face looks at,
//! and the corners that make up each face's quad.
//!
//! Block grids store z mirrored relative to the world (grid rows follow the noise window's
//! flipped y axis), so each side carries both its grid-space and world-space offset.

use cgmath::Vector3;

/// Represents the six possible faces of a voxel block.
///
/// The discriminants give the order used by texture tables: +Y, -Y, +Z, -Z, +X, -X.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The top face (facing positive Y)
    TOP = 0,

    /// The bottom face (facing negative Y)
    BOTTOM = 1,

    /// The front face (facing positive world Z)
    FRONT = 2,

    /// The back face (facing negative world Z)
    BACK = 3,

    /// The right face (facing positive X)
    RIGHT = 4,

    /// The left face (facing negative X)
    LEFT = 5,
}

/// Corners of a unit block relative to its local origin, in the mesh's local frame.
///
/// The block spans `x` in [0, 1], `y` in [0, 1] and `z` in [-1, 0].
pub const CORNER_OFFSETS: [Vector3<f32>; 8] = [
    Vector3 { x: 0.0, y: 0.0, z: 0.0 },
    Vector3 { x: 1.0, y: 0.0, z: 0.0 },
    Vector3 { x: 1.0, y: 0.0, z: -1.0 },
    Vector3 { x: 0.0, y: 0.0, z: -1.0 },
    Vector3 { x: 0.0, y: 1.0, z: 0.0 },
    Vector3 { x: 1.0, y: 1.0, z: 0.0 },
    Vector3 { x: 1.0, y: 1.0, z: -1.0 },
    Vector3 { x: 0.0, y: 1.0, z: -1.0 },
];

impl BlockSide {
    /// Returns all six block faces in texture-table order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::TOP,
            BlockSide::BOTTOM,
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::RIGHT,
            BlockSide::LEFT,
        ]
    }

    /// Offset from a block to the neighbour this face touches, in grid indices.
    pub fn grid_offset(self) -> Vector3<i32> {
        match self {
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::FRONT => Vector3::new(0, 0, -1),
            BlockSide::BACK => Vector3::new(0, 0, 1),
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
        }
    }

    /// Offset from a block to the neighbour this face touches, in world cells.
    pub fn world_offset(self) -> Vector3<i32> {
        let grid = self.grid_offset();
        Vector3::new(grid.x, grid.y, -grid.z)
    }

    /// Outward unit normal of the face.
    pub fn normal(self) -> Vector3<f32> {
        self.world_offset().cast::<f32>().unwrap_or(Vector3::new(0.0, 0.0, 0.0))
    }

    /// Indices into `CORNER_OFFSETS` of the face's quad, wound so that the triangles
    /// `(0, 1, 2)` and `(0, 2, 3)` face outward.
    pub fn corner_indices(self) -> [usize; 4] {
        match self {
            BlockSide::TOP => [4, 5, 6, 7],
            BlockSide::BOTTOM => [1, 0, 3, 2],
            BlockSide::FRONT => [5, 4, 0, 1],
            BlockSide::BACK => [7, 6, 2, 3],
            BlockSide::RIGHT => [6, 5, 1, 2],
            BlockSide::LEFT => [4, 7, 3, 0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_corner_winding_faces_outward() {
        for side in BlockSide::all() {
            let [a, b, c, _] = side.corner_indices().map(|i| CORNER_OFFSETS[i]);
            let normal = (b - a).cross(c - a).normalize();
            assert!(
                (normal - side.normal()).magnitude() < EPSILON,
                "{side:?} winds to {normal:?}, expected {:?}",
                side.normal()
            );
        }
    }

    #[test]
    fn test_world_offsets_cover_all_six_directions() {
        let mut offsets: Vec<_> = BlockSide::all()
            .iter()
            .map(|side| {
                let o = side.world_offset();
                (o.x, o.y, o.z)
            })
            .collect();
        offsets.sort_unstable();
        assert_eq!(
            offsets,
            vec![(-1, 0, 0), (0, -1, 0), (0, 0, -1), (0, 0, 1), (0, 1, 0), (1, 0, 0)]
        );
    }

    #[test]
    fn test_discriminants_follow_all_order() {
        for (i, side) in BlockSide::all().iter().enumerate() {
            assert_eq!(*side as usize, i);
        }
    }
}
