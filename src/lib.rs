#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Terrain
//!
//! Procedural terrain streaming: noise-driven height maps, block grids with trees and
//! caves, cubical and continuous LOD meshing, and a chunk manager that keeps the
//! neighbourhood of a moving viewer generated and meshed on worker threads.
//!
//! ## Key Modules
//!
//! * `core` - Concurrency primitives shared across the pipeline
//! * `engine_state` - Settings, generation, meshing, chunks and task management
//! * `error` - The crate error type
//!
//! ## Usage
//!
//! ```no_run
//! use cgmath::Vector3;
//! use voxel_terrain::engine_state::{settings::TerrainSettings, ChunkManager, TerrainEvent};
//!
//! let mut manager = ChunkManager::new(TerrainSettings::default())?;
//! manager.update(Vector3::new(0.0, 40.0, 0.0))?;
//! for event in manager.take_events() {
//!     if let TerrainEvent::MeshChanged { coord, mesh, .. } = event {
//!         let _bytes = mesh.vertex_bytes();
//!         let _origin = manager.layout().chunk_origin(coord);
//!     }
//! }
//! manager.shutdown()?;
//! # Ok::<(), voxel_terrain::error::TerrainError>(())
//! ```

use std::path::Path;

use cgmath::Vector3;
use log::info;
use web_time::Instant;

use engine_state::{settings::TerrainSettings, ChunkManager, TerrainEvent};
use error::TerrainError;

pub mod core;
pub mod engine_state;
pub mod error;

/// Name of the stopwatch logged around the headless walk.
pub const STREAMING_STOPWATCH: &str = "Terrain Streaming";

/// Installs the stdout logger, filtered by `RUST_LOG`.
///
/// The library never installs a logger by itself; hosts call this or bring their own.
pub fn init_logger() {
    let mut log_builder = env_logger::Builder::new();
    let _ = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init();
}

/// Streams terrain headlessly along a straight walk and logs what was produced.
///
/// # Arguments
/// * `settings_path` - JSON settings file; defaults are used when `None`
/// * `ticks` - Number of ticks to walk for
pub fn run(settings_path: Option<&Path>, ticks: u32) -> Result<(), TerrainError> {
    init_logger();
    info!("Logger initialized");

    let settings = match settings_path {
        Some(path) => TerrainSettings::load(path)?,
        None => TerrainSettings::default(),
    };
    let mut manager = ChunkManager::new(settings)?;

    let start = Instant::now();
    let mut meshes = 0;
    let mut colliders = 0;
    let mut evictions = 0;
    for tick in 0..ticks {
        let viewer = Vector3::new(tick as f32 * 2.0, 40.0, 0.0);
        manager.update(viewer)?;
        for event in manager.take_events() {
            match event {
                TerrainEvent::MeshChanged { .. } => meshes += 1,
                TerrainEvent::ColliderInstalled { .. } => colliders += 1,
                TerrainEvent::ChunkEvicted { .. } => evictions += 1,
                TerrainEvent::VisibilityChanged { .. } => {}
            }
        }
    }
    manager.flush()?;

    info!(
        "{STREAMING_STOPWATCH}: {ticks} ticks in {:?}, {meshes} meshes, {colliders} colliders, \
         {evictions} evictions, {} resident chunks",
        start.elapsed(),
        manager.world().resident_chunk_count()
    );
    manager.shutdown()
}
