//! # Chunk Manager
//!
//! The per-tick driver of terrain streaming. It owns the `World` and the `TaskManager`
//! that feeds it, and turns viewer movement into chunk creation, detail changes, collider
//! installs, modification drains and evictions.
//!
//! ## Tick
//!
//! 1. Results that workers finished since the last tick are applied to the world
//! 2. If the viewer moved at all, visible chunks update their colliders
//! 3. If the viewer moved more than `VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE` since the last
//!    refresh (or this is the first tick), visibility and detail are re-evaluated
//! 4. Every `modification_drain_interval` ticks, pending modifications are applied
//! 5. Excess hidden chunks are evicted
//! 6. New work is handed to idle workers
//!
//! No step blocks. `flush()` is the one blocking call and waits until every outstanding
//! task has been handled.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use cgmath::{InnerSpace, Vector2, Vector3};
use log::{debug, info};

use super::rendering::meshing::MeshStrategy;
use super::settings::TerrainSettings;
use super::task_management::TaskManager;
use super::terrain::NoiseField;
use super::voxels::block::BlockTypeSize;
use super::voxels::chunk::Chunk;
use super::voxels::coords::{ChunkCoord, ChunkLayout};
use super::voxels::modification::{EditLog, ModificationSink};
use super::voxels::world::{TerrainEvent, World, WorldTasks};
use crate::error::TerrainError;

/// Distance the viewer has to move before chunk visibility is re-evaluated.
pub const VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE: f32 = 25.0;

const SQR_VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE: f32 =
    VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE * VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE;

/// Streams terrain chunks around a moving viewer.
///
/// # Examples
///
/// ```no_run
/// use cgmath::Vector3;
/// use voxel_terrain::engine_state::{chunk_manager::ChunkManager, settings::TerrainSettings};
///
/// let mut manager = ChunkManager::new(TerrainSettings::default())?;
/// loop {
///     manager.update(Vector3::new(0.0, 40.0, 0.0))?;
///     for event in manager.take_events() {
///         // hand meshes to the renderer and colliders to physics
///         let _ = event;
///     }
/// #   break;
/// }
/// manager.shutdown()?;
/// # Ok::<(), voxel_terrain::error::TerrainError>(())
/// ```
pub struct ChunkManager {
    world: World,
    task_manager: TaskManager<World>,
    last_refresh_position: Option<Vector2<f32>>,
    tick: u64,
}

impl ChunkManager {
    /// Creates a manager with its own worker pool.
    ///
    /// Settings are clamped into their valid ranges first. The noise configuration is then
    /// probed once, so settings that would produce NaN or infinite samples fail here
    /// instead of corrupting chunks later.
    ///
    /// # Errors
    /// * `TerrainError::NoDetailLevels` if `settings.detail_levels` is empty
    /// * `TerrainError::NonFiniteNoise` if any noise layer produces non-finite samples
    pub fn new(mut settings: TerrainSettings) -> Result<Self, TerrainError> {
        settings.validate();
        if settings.detail_levels.is_empty() {
            return Err(TerrainError::NoDetailLevels);
        }
        settings.check_finite()?;

        let layers = [
            Some(&settings.height_map),
            settings.vegetation_map.as_ref(),
            settings.tree_map.as_ref(),
        ];
        for layer in layers.into_iter().flatten() {
            NoiseField::new(&layer.noise).ensure_finite()?;
        }
        if settings.mesh_strategy == MeshStrategy::Cubical {
            NoiseField::new(&settings.voxel.worm.noise).ensure_finite()?;
        }

        let num_workers = settings.worker_count.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        info!(
            "Starting terrain streaming with {num_workers} worker(s), {:?} meshing",
            settings.mesh_strategy
        );

        Ok(Self {
            world: World::new(Arc::new(settings)),
            task_manager: TaskManager::new(num_workers),
            last_refresh_position: None,
            tick: 0,
        })
    }

    /// Advances streaming by one tick.
    ///
    /// # Arguments
    /// * `viewer` - World position of the viewer; only x and z are used
    ///
    /// # Errors
    /// `TerrainError::WorkerDisconnected` if a worker thread died.
    pub fn update(&mut self, viewer: Vector3<f32>) -> Result<(), TerrainError> {
        self.task_manager.process_completed_tasks(&mut self.world)?;

        let viewer = Vector2::new(viewer.x, viewer.z);
        self.world.set_viewer(viewer);

        if self.last_refresh_position != Some(viewer) {
            let tasks = self.world.update_collisions();
            self.publish(tasks);
        }

        let should_refresh = self
            .last_refresh_position
            .map_or(true, |last| {
                (viewer - last).magnitude2() > SQR_VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE
            });
        if should_refresh {
            self.last_refresh_position = Some(viewer);
            let tasks = self.world.update_visible_chunks();
            self.publish(tasks);
        }

        self.tick += 1;
        let interval = u64::from(self.world.settings().modification_drain_interval.max(1));
        if self.tick % interval == 0 {
            let tasks = self.world.drain_modifications();
            self.publish(tasks);
        }

        self.world.evict_excess();
        self.task_manager.process_queued_tasks();
        Ok(())
    }

    fn publish(&mut self, tasks: WorldTasks) {
        if !tasks.is_empty() {
            debug!("Publishing {} terrain task(s)", tasks.len());
        }
        for task in tasks {
            self.task_manager.publish_task(task);
        }
    }

    /// Blocks until every outstanding task, including follow-ups, has been handled.
    pub fn flush(&mut self) -> Result<(), TerrainError> {
        self.task_manager.drain(&mut self.world)
    }

    /// Finishes outstanding work and stops the worker threads.
    pub fn shutdown(self) -> Result<(), TerrainError> {
        let ChunkManager {
            mut world,
            task_manager,
            ..
        } = self;
        task_manager.shutdown(&mut world)
    }

    /// Places `block_type` in the cell containing world position `position`.
    ///
    /// # Returns
    /// `false` if the terrain has no block data and the edit was dropped.
    pub fn edit_block(&self, position: Vector3<f32>, block_type: BlockTypeSize) -> bool {
        self.world.sink().edit_at(position, block_type)
    }

    /// A handle other threads can submit edits through.
    pub fn edit_sink(&self) -> ModificationSink {
        self.world.sink().clone()
    }

    /// Events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<TerrainEvent> {
        self.world.take_events()
    }

    /// Writes every accepted edit to `path` as JSON.
    pub fn save_edit_log(&self, path: impl AsRef<Path>) -> Result<(), TerrainError> {
        self.world.sink().edit_log().save(path)
    }

    /// Replays the edits stored at `path`.
    pub fn load_edit_log(&self, path: impl AsRef<Path>) -> Result<(), TerrainError> {
        let log = EditLog::load(path)?;
        info!("Replaying {} edit(s)", log.edits.len());
        self.world.sink().replay(&log);
        Ok(())
    }

    /// The validated settings in use.
    pub fn settings(&self) -> &TerrainSettings {
        self.world.settings()
    }

    /// Chunk dimensions.
    pub fn layout(&self) -> &ChunkLayout {
        self.world.layout()
    }

    /// The chunk at `coord`, if resident.
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.world.chunk(coord)
    }

    /// The resident chunks and their state.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Tasks queued or running on workers.
    pub fn has_pending_work(&self) -> bool {
        self.task_manager.has_pending_work()
    }
}
