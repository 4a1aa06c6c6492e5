//! Task for generating mesh data for chunks in a background thread.
//!
//! This module contains the `MeshGenerationTask` which builds one level of detail of a
//! chunk's mesh. This keeps the main thread responsive while meshing runs.

use std::sync::Arc;

use log::{debug, error, trace};
use web_time::Instant;

use crate::{
    engine_state::{
        rendering::meshing::{MeshGenerator, MeshPayload, MeshSource},
        task_management::task::{Task, TaskResult},
        voxels::{coords::ChunkCoord, world::World},
    },
    error::TerrainError,
};

/// A task that builds a chunk mesh in a background thread.
///
/// The task meshes an immutable snapshot taken when it was published, so modifications
/// applied meanwhile never race with it. The result carries the revision of that
/// snapshot and is dropped if the chunk has moved on.
pub struct MeshGenerationTask {
    coord: ChunkCoord,
    slot: usize,
    lod: usize,
    revision: u64,
    source: MeshSource,
    generator: Arc<dyn MeshGenerator>,
}

impl MeshGenerationTask {
    /// Creates a new mesh generation task.
    ///
    /// # Arguments
    /// * `coord` - The chunk being meshed
    /// * `slot` - Index of the chunk's LOD slot the mesh is for
    /// * `lod` - Level of detail to mesh at
    /// * `revision` - Revision of the chunk data in `source`
    /// * `source` - Snapshot of the chunk data
    /// * `generator` - The mesher to run
    pub fn new(
        coord: ChunkCoord,
        slot: usize,
        lod: usize,
        revision: u64,
        source: MeshSource,
        generator: Arc<dyn MeshGenerator>,
    ) -> Self {
        MeshGenerationTask {
            coord,
            slot,
            lod,
            revision,
            source,
            generator,
        }
    }
}

impl Task<World> for MeshGenerationTask {
    fn process(&self) -> Box<dyn TaskResult<World> + Send> {
        let start = Instant::now();
        let mesh = self.generator.generate(&self.source, self.lod);
        if let Ok(mesh) = &mesh {
            trace!(
                "Built {} mesh of chunk {:?} at LOD {} ({} triangles) in {:?}",
                self.generator.name(),
                self.coord,
                self.lod,
                mesh.triangle_count(),
                start.elapsed()
            );
        }

        Box::new(MeshGenerationTaskResult {
            coord: self.coord,
            slot: self.slot,
            revision: self.revision,
            mesh,
        })
    }
}

/// The result of a mesh generation task.
pub struct MeshGenerationTaskResult {
    coord: ChunkCoord,
    slot: usize,
    revision: u64,
    mesh: Result<MeshPayload, TerrainError>,
}

impl TaskResult<World> for MeshGenerationTaskResult {
    /// Installs the mesh, or frees the slot so the build is retried later.
    ///
    /// Failures are reported once per slot, when it stops retrying.
    fn handle_result(self: Box<Self>, world: &mut World) -> Vec<Box<dyn Task<World> + Send>> {
        match self.mesh {
            Ok(mesh) => world.install_mesh(self.coord, self.slot, self.revision, mesh),
            Err(err) => {
                if world.abandon_mesh(self.coord, self.slot) {
                    error!(
                        "Giving up on slot {} of chunk {:?}: {err}",
                        self.slot, self.coord
                    );
                } else {
                    debug!("Failed to mesh chunk {:?}, will retry: {err}", self.coord);
                }
                Vec::new()
            }
        }
    }
}
