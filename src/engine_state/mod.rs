//! # Engine State Module
//!
//! The terrain streaming engine.
//!
//! ## Key Components
//!
//! * `chunk_manager` - The per-tick driver the host talks to
//! * `settings` - Serializable configuration of every stage
//! * `terrain` - Noise sampling and height map construction
//! * `voxels` - Block grids, chunks, modifications and the world
//! * `rendering` - Mesh generation and the renderer-facing vertex layout
//! * `task_management` - The worker pool that runs generation off the main thread
//!
//! ## Architecture
//!
//! Data flows one way: settings configure pure generators, the generators run as tasks on
//! worker threads, and their results are applied to the `World` on the main thread. The
//! host only sees `ChunkManager::update()` and the `TerrainEvent`s it produces.

pub mod chunk_manager;
pub mod rendering;
pub mod settings;
pub mod task_management;
pub mod terrain;
pub mod voxels;

pub use chunk_manager::ChunkManager;
pub use voxels::world::TerrainEvent;
