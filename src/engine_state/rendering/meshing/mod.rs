//! Mesh generation for streamed terrain.
//!
//! This module turns chunk data into renderable surfaces. Two strategies sit behind the
//! `MeshGenerator` trait and are chosen by `TerrainSettings::mesh_strategy`:
//!
//! - `CubicalMesher`: one textured quad per block face exposed to air
//! - `ContinuousMesher`: a single height-field surface with per-LOD vertex skipping, a
//!   border ring for seamless normals and edge-connection vertices that stitch a
//!   reduced interior to the full-resolution edge
//!
//! Generators are immutable and shared between worker threads. They only ever read a
//! `MeshSource`, an immutable snapshot of a chunk's data taken when the build is requested.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine_state::settings::TerrainSettings;
use crate::engine_state::terrain::HeightField;
use crate::engine_state::voxels::voxel_grid::VoxelGrid;
use crate::error::TerrainError;

mod continuous;
mod cubical;
mod mesh_payload;

pub use continuous::ContinuousMesher;
pub use cubical::CubicalMesher;
pub use mesh_payload::MeshPayload;

/// Which mesher a terrain uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshStrategy {
    /// Blocks with culled hidden faces.
    #[default]
    Cubical,
    /// A smooth height-field surface with levels of detail.
    Continuous,
}

/// The data a mesh is built from.
#[derive(Clone, Debug)]
pub enum MeshSource {
    /// A block grid, border ring included.
    Voxels(Arc<VoxelGrid>),
    /// A height window including both border rings.
    Heights(Arc<HeightField>),
}

impl MeshSource {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            MeshSource::Voxels(_) => "voxel grid",
            MeshSource::Heights(_) => "height field",
        }
    }
}

/// Builds meshes from chunk data.
pub trait MeshGenerator: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Builds the mesh of `source` at level of detail `lod`.
    ///
    /// # Errors
    /// `TerrainError::MeshSourceMismatch` if `source` is not the kind this generator meshes.
    fn generate(&self, source: &MeshSource, lod: usize) -> Result<MeshPayload, TerrainError>;
}

/// The generator selected by `settings`.
pub fn generator_for(settings: &TerrainSettings) -> Arc<dyn MeshGenerator> {
    match settings.mesh_strategy {
        MeshStrategy::Cubical => Arc::new(CubicalMesher::new(
            settings.mesh_world_size().round() as i32,
            settings.voxel.block_textures.clone(),
            settings.voxel.atlas_size_in_blocks,
        )),
        MeshStrategy::Continuous => Arc::new(ContinuousMesher::new(
            settings.mesh_world_size(),
            settings.mesh.use_flat_shading,
        )),
    }
}
