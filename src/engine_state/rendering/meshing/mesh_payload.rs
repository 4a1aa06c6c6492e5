//! Finished meshes.

use cgmath::{InnerSpace, Vector2, Vector3, Zero};

use crate::engine_state::rendering::Vertex;

/// A renderable surface in its chunk's local frame.
///
/// `positions`, `normals` and `uvs` run in parallel; `indices` lists triangles as
/// consecutive triples wound counter-clockwise when seen from the front.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshPayload {
    /// Vertex positions.
    pub positions: Vec<Vector3<f32>>,
    /// Unit vertex normals.
    pub normals: Vec<Vector3<f32>>,
    /// Texture coordinates.
    pub uvs: Vec<Vector2<f32>>,
    /// Triangle list.
    pub indices: Vec<u32>,
}

impl MeshPayload {
    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Corner positions of triangle `triangle`.
    pub fn triangle(&self, triangle: usize) -> [Vector3<f32>; 3] {
        let base = triangle * 3;
        [0, 1, 2].map(|i| self.positions[self.indices[base + i] as usize])
    }

    /// Smooth normals: every vertex gets the normalized sum of its triangles' face normals.
    pub fn recalculate_normals(&mut self) {
        let mut normals = vec![Vector3::zero(); self.positions.len()];
        for triangle in self.indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
            let normal = face_normal(self.positions[a], self.positions[b], self.positions[c]);
            normals[a] += normal;
            normals[b] += normal;
            normals[c] += normal;
        }
        self.normals = normals.into_iter().map(normalize_or_up).collect();
    }

    /// Gives every triangle its own three vertices so each face shades flat.
    pub fn into_flat_shaded(self) -> MeshPayload {
        let mut flat = MeshPayload {
            positions: Vec::with_capacity(self.indices.len()),
            normals: Vec::with_capacity(self.indices.len()),
            uvs: Vec::with_capacity(self.indices.len()),
            indices: Vec::with_capacity(self.indices.len()),
        };
        for triangle in self.indices.chunks_exact(3) {
            let corners = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
            let normal = normalize_or_up(face_normal(
                self.positions[corners[0]],
                self.positions[corners[1]],
                self.positions[corners[2]],
            ));
            for corner in corners {
                flat.indices.push(flat.positions.len() as u32);
                flat.positions.push(self.positions[corner]);
                flat.normals.push(normal);
                flat.uvs.push(self.uvs.get(corner).copied().unwrap_or(Vector2::zero()));
            }
        }
        flat
    }

    /// Interleaves the vertex attributes for upload.
    pub fn to_vertices(&self) -> Vec<Vertex> {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, &position)| {
                Vertex::new(
                    position,
                    self.normals.get(i).copied().unwrap_or(Vector3::unit_y()),
                    self.uvs.get(i).copied().unwrap_or(Vector2::zero()),
                )
            })
            .collect()
    }

    /// The interleaved vertices as raw bytes.
    pub fn vertex_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.to_vertices()).to_vec()
    }
}

/// Unnormalized normal of triangle `(a, b, c)`.
pub(crate) fn face_normal(a: Vector3<f32>, b: Vector3<f32>, c: Vector3<f32>) -> Vector3<f32> {
    let normal = (b - a).cross(c - a);
    if normal.magnitude2() > 0.0 {
        normal.normalize()
    } else {
        Vector3::zero()
    }
}

fn normalize_or_up(normal: Vector3<f32>) -> Vector3<f32> {
    if normal.magnitude2() > 0.0 {
        normal.normalize()
    } else {
        Vector3::unit_y()
    }
}
