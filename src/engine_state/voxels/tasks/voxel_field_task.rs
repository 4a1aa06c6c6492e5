//! # Voxel Field Task
//!
//! Builds a chunk's block grid from its height layers once they have arrived.

use std::sync::Arc;

use log::trace;
use web_time::Instant;

use crate::engine_state::{
    settings::TerrainSettings,
    task_management::task::{Task, TaskResult},
    terrain::HeightLayers,
    voxels::{
        coords::{ChunkCoord, ChunkLayout},
        voxel_field::{PopulatedVoxels, VoxelField},
        world::World,
    },
};

/// A task that populates the block grid of one chunk.
///
/// Trees and caves that reach past the grid come back as routed modifications rather than
/// being written out of bounds.
pub struct VoxelFieldTask {
    coord: ChunkCoord,
    revision: u64,
    settings: Arc<TerrainSettings>,
    layout: ChunkLayout,
    layers: HeightLayers,
}

impl VoxelFieldTask {
    /// Creates a new voxel field task.
    ///
    /// # Arguments
    /// * `coord` - The chunk being populated
    /// * `revision` - Revision of the chunk when the task was published
    /// * `settings` - Terrain settings shared with the world
    /// * `layout` - Chunk dimensions
    /// * `layers` - The chunk's height layers, aligned with its grid
    pub fn new(
        coord: ChunkCoord,
        revision: u64,
        settings: Arc<TerrainSettings>,
        layout: ChunkLayout,
        layers: HeightLayers,
    ) -> Self {
        VoxelFieldTask {
            coord,
            revision,
            settings,
            layout,
            layers,
        }
    }
}

impl Task<World> for VoxelFieldTask {
    fn process(&self) -> Box<dyn TaskResult<World> + Send> {
        let start = Instant::now();
        let populated = VoxelField::new(&self.settings, self.layout).populate(self.coord, &self.layers);
        trace!(
            "Populated chunk {:?} in {:?} ({} local, {} foreign modifications)",
            self.coord,
            start.elapsed(),
            populated.modifications.local.len(),
            populated.modifications.foreign.len()
        );

        Box::new(VoxelFieldTaskResult {
            coord: self.coord,
            revision: self.revision,
            populated,
        })
    }
}

/// A populated block grid.
pub struct VoxelFieldTaskResult {
    coord: ChunkCoord,
    revision: u64,
    populated: PopulatedVoxels,
}

impl TaskResult<World> for VoxelFieldTaskResult {
    fn handle_result(self: Box<Self>, world: &mut World) -> Vec<Box<dyn Task<World> + Send>> {
        world.install_voxels(self.coord, self.revision, self.populated)
    }
}
