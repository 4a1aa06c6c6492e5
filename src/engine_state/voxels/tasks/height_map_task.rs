//! # Height Map Task
//!
//! Samples every configured height layer of a chunk. This is the first task published
//! for a new chunk.

use std::sync::Arc;

use cgmath::Vector2;
use log::trace;
use web_time::Instant;

use crate::engine_state::{
    settings::TerrainSettings,
    task_management::task::{Task, TaskResult},
    terrain::HeightLayers,
    voxels::{coords::ChunkCoord, world::World},
};

/// A task that samples the height layers of one chunk.
pub struct HeightMapTask {
    coord: ChunkCoord,
    revision: u64,
    settings: Arc<TerrainSettings>,
    sample_center: Vector2<f32>,
}

impl HeightMapTask {
    /// Creates a new height map task.
    ///
    /// # Arguments
    /// * `coord` - The chunk the layers are for
    /// * `revision` - Revision of the chunk when the task was published
    /// * `settings` - Terrain settings shared with the world
    /// * `sample_center` - Center of the window in sample space
    pub fn new(
        coord: ChunkCoord,
        revision: u64,
        settings: Arc<TerrainSettings>,
        sample_center: Vector2<f32>,
    ) -> Self {
        HeightMapTask {
            coord,
            revision,
            settings,
            sample_center,
        }
    }
}

impl Task<World> for HeightMapTask {
    fn process(&self) -> Box<dyn TaskResult<World> + Send> {
        let start = Instant::now();
        let size = self.settings.height_window_size();
        let layers = HeightLayers::generate(&self.settings, size, self.sample_center);
        trace!(
            "Sampled {size}x{size} height layers for chunk {:?} in {:?}",
            self.coord,
            start.elapsed()
        );

        Box::new(HeightMapTaskResult {
            coord: self.coord,
            revision: self.revision,
            layers,
        })
    }
}

/// The sampled layers of a chunk.
pub struct HeightMapTaskResult {
    coord: ChunkCoord,
    revision: u64,
    layers: HeightLayers,
}

impl TaskResult<World> for HeightMapTaskResult {
    /// Stores the layers on the chunk; block terrain follows up with a `VoxelFieldTask`.
    fn handle_result(self: Box<Self>, world: &mut World) -> Vec<Box<dyn Task<World> + Send>> {
        world.install_height_layers(self.coord, self.revision, self.layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_matches_the_mesher_input_size() {
        let settings = Arc::new(TerrainSettings::default());
        let task = HeightMapTask::new(ChunkCoord::new(0, 0), 1, settings.clone(), Vector2::new(0.0, 0.0));
        let mut world = World::new(settings.clone());
        // The chunk does not exist, so the result is discarded without follow-ups.
        assert!(task.process().handle_result(&mut world).is_empty());

        let layers = HeightLayers::generate(&settings, settings.height_window_size(), Vector2::new(0.0, 0.0));
        assert_eq!(layers.ground.width(), world.layout().grid_width() as usize);
    }
}
