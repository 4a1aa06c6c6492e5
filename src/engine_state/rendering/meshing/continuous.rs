//! Height-field meshing with levels of detail.
//!
//! The height window has `n` samples per side. Its vertices fall into four groups:
//!
//! - **Border** (index 0 and `n - 1`): outside the mesh. Their triangles only feed the
//!   normals of the edge vertices, so normals match across chunk seams.
//! - **Mesh edge** (index 1 and `n - 2`): the visible outline, always at full resolution.
//! - **Edge connection** (index 2 and `n - 3`, off the skip grid): height is interpolated
//!   between the two nearest main vertices so the reduced interior meets the
//!   full-resolution edge without cracks.
//! - **Main**: interior vertices on the skip grid of the requested level of detail.
//!
//! Every other interior vertex is skipped. Border vertices get negative indices and are
//! never part of the returned mesh.

use cgmath::{InnerSpace, Vector2, Vector3, Zero};

use crate::engine_state::settings::skip_increment;
use crate::engine_state::terrain::HeightField;
use crate::error::TerrainError;

use super::mesh_payload::face_normal;
use super::{MeshGenerator, MeshPayload, MeshSource};

/// Meshes height windows into a single surface.
pub struct ContinuousMesher {
    mesh_world_size: f32,
    use_flat_shading: bool,
}

impl ContinuousMesher {
    /// Creates a mesher for chunks `mesh_world_size` units wide.
    pub fn new(mesh_world_size: f32, use_flat_shading: bool) -> Self {
        Self {
            mesh_world_size,
            use_flat_shading,
        }
    }

    fn mesh_heights(&self, heights: &HeightField, lod: usize) -> MeshPayload {
        let n = heights.width().min(heights.height()) as i32;
        if n < 5 {
            return MeshPayload::default();
        }
        let grid = VertexGrid {
            n,
            skip: skip_increment(lod) as i32,
        };

        let mut index_map = vec![None; (n * n) as usize];
        let mut mesh_index = 0;
        let mut border_index = -1;
        for y in 0..n {
            for x in 0..n {
                let slot = &mut index_map[(y * n + x) as usize];
                if grid.is_out_of_mesh(x, y) {
                    *slot = Some(border_index);
                    border_index -= 1;
                } else if !grid.is_skipped(x, y) {
                    *slot = Some(mesh_index);
                    mesh_index += 1;
                }
            }
        }
        let index_at = |x: i32, y: i32| index_map.get((y * n + x) as usize).copied().flatten();

        let mut skirted = SkirtedMesh::default();
        let top_left = Vector2::new(-1.0, 1.0) * self.mesh_world_size / 2.0;

        for y in 0..n {
            for x in 0..n {
                if grid.is_skipped(x, y) {
                    continue;
                }
                let Some(index) = index_at(x, y) else {
                    continue;
                };

                let percent = Vector2::new((x - 1) as f32, (y - 1) as f32) / (n - 3) as f32;
                let position_2d =
                    top_left + Vector2::new(percent.x, -percent.y) * self.mesh_world_size;
                let height = if grid.is_edge_connection(x, y) {
                    grid.connection_height(heights, x, y)
                } else {
                    heights.get_or_zero(x, y)
                };
                skirted.add_vertex(
                    index,
                    Vector3::new(position_2d.x, height, position_2d.y),
                    percent,
                );

                let create_triangles = x < n - 1
                    && y < n - 1
                    && (!grid.is_edge_connection(x, y) || (x != 2 && y != 2));
                if !create_triangles {
                    continue;
                }
                let increment = if grid.is_main(x, y) && x != n - 3 && y != n - 3 {
                    grid.skip
                } else {
                    1
                };
                let corners = (
                    index_at(x, y),
                    index_at(x + increment, y),
                    index_at(x, y + increment),
                    index_at(x + increment, y + increment),
                );
                if let (Some(a), Some(b), Some(c), Some(d)) = corners {
                    skirted.add_triangle(a, d, c);
                    skirted.add_triangle(d, a, b);
                }
            }
        }

        let mesh = skirted.finish();
        if self.use_flat_shading {
            mesh.into_flat_shaded()
        } else {
            mesh
        }
    }
}

impl MeshGenerator for ContinuousMesher {
    fn name(&self) -> &'static str {
        "continuous"
    }

    fn generate(&self, source: &MeshSource, lod: usize) -> Result<MeshPayload, TerrainError> {
        match source {
            MeshSource::Heights(heights) => Ok(self.mesh_heights(heights, lod)),
            other => Err(TerrainError::MeshSourceMismatch {
                generator: self.name(),
                source_kind: other.kind(),
            }),
        }
    }
}

/// Vertex classification for an `n` x `n` window at one skip increment.
struct VertexGrid {
    n: i32,
    skip: i32,
}

impl VertexGrid {
    fn is_out_of_mesh(&self, x: i32, y: i32) -> bool {
        x == 0 || y == 0 || x == self.n - 1 || y == self.n - 1
    }

    fn is_skipped(&self, x: i32, y: i32) -> bool {
        let n = self.n;
        x > 2
            && x < n - 3
            && y > 2
            && y < n - 3
            && ((x - 2) % self.skip != 0 || (y - 2) % self.skip != 0)
    }

    fn is_mesh_edge(&self, x: i32, y: i32) -> bool {
        let n = self.n;
        (x == 1 || y == 1 || x == n - 2 || y == n - 2) && !self.is_out_of_mesh(x, y)
    }

    fn is_main(&self, x: i32, y: i32) -> bool {
        (x - 2) % self.skip == 0
            && (y - 2) % self.skip == 0
            && !self.is_out_of_mesh(x, y)
            && !self.is_mesh_edge(x, y)
    }

    fn is_edge_connection(&self, x: i32, y: i32) -> bool {
        let n = self.n;
        (x == 2 || y == 2 || x == n - 3 || y == n - 3)
            && !self.is_out_of_mesh(x, y)
            && !self.is_mesh_edge(x, y)
            && !self.is_main(x, y)
    }

    /// Height of an edge-connection vertex, linearly between the main vertices on
    /// either side of it along the edge.
    fn connection_height(&self, heights: &HeightField, x: i32, y: i32) -> f32 {
        let vertical = x == 2 || x == self.n - 3;
        let along = if vertical { y } else { x };
        let dst_to_a = (along - 2) % self.skip;
        let dst_to_b = self.skip - dst_to_a;
        let t = dst_to_a as f32 / self.skip as f32;

        let (a, b) = if vertical {
            (
                heights.get_or_zero(x, y - dst_to_a),
                heights.get_or_zero(x, y + dst_to_b),
            )
        } else {
            (
                heights.get_or_zero(x - dst_to_a, y),
                heights.get_or_zero(x + dst_to_b, y),
            )
        };
        a * (1.0 - t) + b * t
    }
}

/// Mesh under construction together with its border ring.
#[derive(Default)]
struct SkirtedMesh {
    positions: Vec<Vector3<f32>>,
    uvs: Vec<Vector2<f32>>,
    indices: Vec<u32>,
    border_positions: Vec<Vector3<f32>>,
    border_triangles: Vec<[i32; 3]>,
}

impl SkirtedMesh {
    /// Vertices must be added in index order: `0, 1, 2, ...` and `-1, -2, -3, ...`.
    fn add_vertex(&mut self, index: i32, position: Vector3<f32>, uv: Vector2<f32>) {
        if index < 0 {
            self.border_positions.push(position);
        } else {
            self.positions.push(position);
            self.uvs.push(uv);
        }
    }

    fn add_triangle(&mut self, a: i32, b: i32, c: i32) {
        if a < 0 || b < 0 || c < 0 {
            self.border_triangles.push([a, b, c]);
        } else {
            self.indices.extend_from_slice(&[a as u32, b as u32, c as u32]);
        }
    }

    fn position(&self, index: i32) -> Vector3<f32> {
        if index < 0 {
            self.border_positions[(-index - 1) as usize]
        } else {
            self.positions[index as usize]
        }
    }

    fn finish(self) -> MeshPayload {
        let mut normals = vec![Vector3::zero(); self.positions.len()];
        let mesh_triangles = self
            .indices
            .chunks_exact(3)
            .map(|t| [t[0] as i32, t[1] as i32, t[2] as i32]);
        for triangle in mesh_triangles.chain(self.border_triangles.iter().copied()) {
            let [a, b, c] = triangle;
            let normal = face_normal(self.position(a), self.position(b), self.position(c));
            for index in triangle {
                if index >= 0 {
                    normals[index as usize] += normal;
                }
            }
        }
        let normals = normals
            .into_iter()
            .map(|n: Vector3<f32>| {
                if n.magnitude2() > 0.0 {
                    n.normalize()
                } else {
                    Vector3::unit_y()
                }
            })
            .collect();

        MeshPayload {
            positions: self.positions,
            normals,
            uvs: self.uvs,
            indices: self.indices,
        }
    }
}
