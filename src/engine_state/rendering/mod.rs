//! Rendering handoff for the terrain.
//!
//! This module turns chunk data into meshes the host renderer can upload. It owns no GPU
//! state: meshes leave through `TerrainEvent`s and can be interleaved into `Vertex`
//! buffers with `MeshPayload::to_vertices()`.
//!
//! # Structure
//! - `meshing`: the `MeshGenerator` strategies and the `MeshPayload` they produce
//! - `tasks`: background mesh builds

pub mod meshing;
pub mod tasks;
mod vertex;

// Re-export commonly used types
pub use vertex::Vertex;
