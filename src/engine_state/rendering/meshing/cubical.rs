//! Block meshing with hidden-face culling.
//!
//! Every solid cell of the grid's interior emits one quad per face whose neighbour is not
//! solid. The border ring is only ever read, never meshed, and reads past the grid count
//! as air, so the faces of a chunk's outermost blocks depend on the neighbour's copy of
//! the adjacent cell rather than on a missing value.

use cgmath::Vector3;

use crate::engine_state::voxels::block::block_side::{BlockSide, CORNER_OFFSETS};
use crate::engine_state::voxels::block::{BlockTextureTable, BlockTypeSize};
use crate::engine_state::voxels::voxel_grid::VoxelGrid;
use crate::error::TerrainError;

use super::{MeshGenerator, MeshPayload, MeshSource};

/// Meshes block grids. The level of detail is ignored.
pub struct CubicalMesher {
    chunk_width: i32,
    textures: BlockTextureTable,
    atlas_size_in_blocks: u32,
}

impl CubicalMesher {
    /// Creates a mesher for chunks `chunk_width` blocks wide.
    pub fn new(chunk_width: i32, textures: BlockTextureTable, atlas_size_in_blocks: u32) -> Self {
        Self {
            chunk_width,
            textures,
            atlas_size_in_blocks,
        }
    }

    fn mesh_grid(&self, grid: &VoxelGrid) -> MeshPayload {
        let mut mesh = MeshPayload::default();
        let width = grid.width();
        let half = self.chunk_width as f32 / 2.0;

        for y in 0..grid.height() {
            for z in 1..width - 1 {
                for x in 1..width - 1 {
                    if !grid.is_solid(x, y, z) {
                        continue;
                    }
                    let block = grid.get(x, y, z);
                    let origin = Vector3::new(
                        -half + (x - 1) as f32,
                        y as f32,
                        half - (z - 1) as f32,
                    );
                    for side in BlockSide::all() {
                        let n = side.grid_offset();
                        if grid.is_solid(x + n.x, y + n.y, z + n.z) {
                            continue;
                        }
                        self.push_face(&mut mesh, origin, block, side);
                    }
                }
            }
        }

        mesh.recalculate_normals();
        mesh
    }

    fn push_face(
        &self,
        mesh: &mut MeshPayload,
        origin: Vector3<f32>,
        block: BlockTypeSize,
        side: BlockSide,
    ) {
        let first = mesh.positions.len() as u32;
        let uvs = self
            .textures
            .face_uvs(block, side, self.atlas_size_in_blocks);
        for (corner, uv) in side.corner_indices().into_iter().zip(uvs) {
            mesh.positions.push(origin + CORNER_OFFSETS[corner]);
            mesh.uvs.push(uv);
        }
        mesh.indices
            .extend_from_slice(&[first, first + 1, first + 2, first, first + 2, first + 3]);
    }
}

impl MeshGenerator for CubicalMesher {
    fn name(&self) -> &'static str {
        "cubical"
    }

    fn generate(&self, source: &MeshSource, _lod: usize) -> Result<MeshPayload, TerrainError> {
        match source {
            MeshSource::Voxels(grid) => Ok(self.mesh_grid(grid)),
            other => Err(TerrainError::MeshSourceMismatch {
                generator: self.name(),
                source_kind: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use cgmath::{InnerSpace, Vector2};

    const EPSILON: f32 = 1e-5;
    const CHUNK_WIDTH: i32 = 18;

    fn mesher() -> CubicalMesher {
        CubicalMesher::new(CHUNK_WIDTH, BlockTextureTable::default(), 16)
    }

    fn filled_grid(height: i32, include_border: bool) -> VoxelGrid {
        let width = CHUNK_WIDTH + 2;
        let mut grid = VoxelGrid::new(width, height);
        let range = if include_border { 0..width } else { 1..width - 1 };
        for y in 0..height {
            for z in range.clone() {
                for x in range.clone() {
                    grid.set(x, y, z, BlockType::STONE.as_int());
                }
            }
        }
        grid
    }

    #[test]
    fn test_solid_chunk_emits_only_boundary_faces_facing_out() {
        let height = 4;
        let mesh = mesher().mesh_grid(&filled_grid(height, false));
        let s = CHUNK_WIDTH as usize;
        let expected_faces = 2 * s * s + 4 * s * height as usize;
        assert_eq!(mesh.triangle_count(), expected_faces * 2);

        let half = CHUNK_WIDTH as f32 / 2.0;
        let center = Vector3::new(0.0, height as f32 / 2.0, 0.0);
        for quad in 0..expected_faces {
            let corners = &mesh.positions[quad * 4..quad * 4 + 4];
            let face_center = corners.iter().fold(Vector3::new(0.0, 0.0, 0.0), |a, &c| a + c) / 4.0;
            let normal = mesh.normals[quad * 4];
            assert!(
                normal.dot(face_center - center) > 0.0,
                "face at {face_center:?} points inward ({normal:?})"
            );
            let on_boundary = (face_center.x.abs() - half).abs() < EPSILON
                || (face_center.z.abs() - half).abs() < EPSILON
                || face_center.y.abs() < EPSILON
                || (face_center.y - height as f32).abs() < EPSILON;
            assert!(on_boundary, "interior face emitted at {face_center:?}");
        }
    }

    #[test]
    fn test_solid_border_hides_side_faces_without_reading_out_of_bounds() {
        let height = 3;
        let mesh = mesher().mesh_grid(&filled_grid(height, true));
        let s = CHUNK_WIDTH as usize;
        assert_eq!(mesh.triangle_count(), 2 * s * s * 2, "only the top and bottom remain");
    }

    #[test]
    fn test_single_block_occupies_its_world_cell() {
        let mut grid = VoxelGrid::new(CHUNK_WIDTH + 2, 4);
        // Grid (1, 2, 1) is world cell (-9, 2, 8) of chunk (0, 0).
        grid.set(1, 2, 1, BlockType::DIRT.as_int());
        let mesh = mesher().mesh_grid(&grid);
        assert_eq!(mesh.triangle_count(), 12);
        for p in &mesh.positions {
            assert!((-9.0..=-8.0).contains(&p.x), "{p:?}");
            assert!((2.0..=3.0).contains(&p.y), "{p:?}");
            assert!((8.0..=9.0).contains(&p.z), "{p:?}");
        }
    }

    #[test]
    fn test_faces_use_the_block_texture() {
        let mut grid = VoxelGrid::new(CHUNK_WIDTH + 2, 2);
        grid.set(5, 0, 5, BlockType::GRASS.as_int());
        let mesh = mesher().mesh_grid(&grid);
        let top = BlockSide::all()
            .iter()
            .position(|side| *side == BlockSide::TOP)
            .unwrap();
        let uvs = &mesh.uvs[top * 4..top * 4 + 4];
        let tile = 1.0 / 16.0;
        let expected = Vector2::new(3.0 * tile, 1.0);
        assert!((uvs[0] - expected).magnitude() < EPSILON, "{:?}", uvs[0]);
    }
}
