//! Background tasks for the rendering system.
//!
//! Mesh builds are the most expensive step of streaming, so they run on worker threads
//! against an immutable snapshot of the chunk's data.
//!
//! # Available Tasks
//! - `MeshGenerationTask`: Builds one level of detail of a chunk's mesh

pub mod mesh_generation_task;
