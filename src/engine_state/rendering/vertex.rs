//! Vertex layout handed to renderers.
//!
//! This module defines the interleaved vertex format a host uploads to the GPU, so the
//! crate's meshes can be copied into a vertex buffer without per-field conversion.

use cgmath::{Vector2, Vector3};

/// An interleaved mesh vertex.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Normal: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
///
/// Total size: 32 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position in the chunk's local frame
    pub position: [f32; 3],
    /// Unit normal
    pub normal: [f32; 3],
    /// UV texture coordinates (normalized 0.0-1.0)
    pub tex_coords: [f32; 2],
}

impl Vertex {
    /// Creates a new vertex.
    ///
    /// # Arguments
    /// * `position` - Position in the chunk's local frame
    /// * `normal` - Unit normal
    /// * `uv` - Texture coordinates
    pub fn new(position: Vector3<f32>, normal: Vector3<f32>, uv: Vector2<f32>) -> Self {
        Vertex {
            position: position.into(),
            normal: normal.into(),
            tex_coords: uv.into(),
        }
    }
}
