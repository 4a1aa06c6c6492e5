//! # World Module
//!
//! This module provides the `World` struct which owns every resident chunk of the streamed
//! terrain. It is the context task results are applied to: height windows, block grids and
//! meshes computed on worker threads all land here, on the main thread.
//!
//! ## Architecture
//!
//! Chunks live in an LRU cache keyed by chunk coordinate. Updating a chunk marks it as
//! recently used, so once the resident count exceeds `max_resident_chunks` the chunks the
//! viewer left behind longest ago are evicted first. Visible chunks are never evicted.
//!
//! Every chunk carries a revision that is unique across the whole world. Work published
//! for a chunk remembers the revision it was computed for, and a result whose chunk has
//! since been evicted, recreated or modified is dropped when it arrives.
//!
//! ## Events
//!
//! Instead of callbacks, the world records `TerrainEvent`s that the host drains once per
//! tick through `take_events()`.

use std::collections::HashSet;
use std::sync::Arc;

use cgmath::Vector2;
use log::{debug, trace};
use lru::LruCache;

use crate::engine_state::rendering::meshing::{
    generator_for, MeshGenerator, MeshPayload, MeshStrategy,
};
use crate::engine_state::rendering::tasks::mesh_generation_task::MeshGenerationTask;
use crate::engine_state::settings::TerrainSettings;
use crate::engine_state::task_management::task::Task;
use crate::engine_state::terrain::HeightLayers;

use super::chunk::{Chunk, MeshDelivery};
use super::coords::{ChunkCoord, ChunkLayout};
use super::modification::ModificationSink;
use super::tasks::height_map_task::HeightMapTask;
use super::tasks::voxel_field_task::VoxelFieldTask;
use super::voxel_field::PopulatedVoxels;

/// Tasks produced while updating the world, to be published by the caller.
pub type WorldTasks = Vec<Box<dyn Task<World> + Send>>;

/// Something the host renderer or physics engine should react to.
#[derive(Clone, Debug)]
pub enum TerrainEvent {
    /// A chunk entered or left view distance.
    VisibilityChanged {
        /// The chunk.
        coord: ChunkCoord,
        /// Whether it is now visible.
        visible: bool,
    },
    /// A chunk should now be drawn with `mesh`.
    MeshChanged {
        /// The chunk.
        coord: ChunkCoord,
        /// Level of detail of the mesh.
        lod: usize,
        /// Mesh in the chunk's local frame; offset it by the chunk origin.
        mesh: Arc<MeshPayload>,
    },
    /// A chunk's collision mesh is ready. Sent once per chunk until its blocks change.
    ColliderInstalled {
        /// The chunk.
        coord: ChunkCoord,
        /// Mesh in the chunk's local frame.
        mesh: Arc<MeshPayload>,
    },
    /// A chunk was dropped from memory; release anything held for it.
    ChunkEvicted {
        /// The chunk.
        coord: ChunkCoord,
    },
}

/// The resident chunks and everything needed to feed them.
pub struct World {
    chunks: LruCache<ChunkCoord, Chunk>,
    settings: Arc<TerrainSettings>,
    layout: ChunkLayout,
    needs_voxels: bool,
    sink: ModificationSink,
    generator: Arc<dyn MeshGenerator>,
    viewer: Vector2<f32>,
    visible_chunks: HashSet<ChunkCoord>,
    events: Vec<TerrainEvent>,
    last_revision: u64,
}

impl World {
    /// Creates an empty world for `settings`, which must already be validated.
    pub fn new(settings: Arc<TerrainSettings>) -> Self {
        let layout = ChunkLayout::new(settings.mesh_world_size(), settings.voxel.chunk_height);
        let needs_voxels = settings.mesh_strategy == MeshStrategy::Cubical;
        debug!(
            "World uses the {:?} mesher with {}-unit chunks",
            settings.mesh_strategy, layout.world_size
        );
        Self {
            chunks: LruCache::unbounded(),
            generator: generator_for(&settings),
            sink: ModificationSink::new(layout, needs_voxels),
            settings,
            layout,
            needs_voxels,
            viewer: Vector2::new(0.0, 0.0),
            visible_chunks: HashSet::new(),
            events: Vec::new(),
            last_revision: 0,
        }
    }

    /// The settings the world was created with.
    pub fn settings(&self) -> &Arc<TerrainSettings> {
        &self.settings
    }

    /// Chunk dimensions.
    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// The shared edit entry point.
    pub fn sink(&self) -> &ModificationSink {
        &self.sink
    }

    /// Last horizontal viewer position.
    pub fn viewer(&self) -> Vector2<f32> {
        self.viewer
    }

    /// Sets the horizontal viewer position used by every subsequent update.
    pub fn set_viewer(&mut self, viewer: Vector2<f32>) {
        self.viewer = viewer;
    }

    /// The chunk at `coord`, if resident. Does not affect eviction order.
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.peek(&coord)
    }

    /// Number of resident chunks.
    pub fn resident_chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Coordinates of every visible chunk.
    pub fn visible_chunks(&self) -> &HashSet<ChunkCoord> {
        &self.visible_chunks
    }

    /// Events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<TerrainEvent> {
        std::mem::take(&mut self.events)
    }

    fn next_revision(&mut self) -> u64 {
        self.last_revision += 1;
        self.last_revision
    }

    /// Re-evaluates every chunk within view distance of the viewer.
    ///
    /// Chunks that were visible before are updated first, so chunks that left the range
    /// still get the update that hides them. Missing chunks are created and their height
    /// layers requested.
    pub fn update_visible_chunks(&mut self) -> WorldTasks {
        let mut tasks = WorldTasks::new();
        let mut updated = HashSet::new();

        let previously_visible: Vec<ChunkCoord> = self.visible_chunks.iter().copied().collect();
        for coord in previously_visible {
            updated.insert(coord);
            tasks.extend(self.update_chunk(coord));
        }

        let current = self.layout.viewer_chunk(self.viewer);
        let range = (self.settings.max_view_distance() / self.layout.world_size).round() as i32;
        for dy in -range..=range {
            for dx in -range..=range {
                let coord = ChunkCoord::new(current.x + dx, current.y + dy);
                if updated.contains(&coord) {
                    continue;
                }
                if self.chunks.contains(&coord) {
                    tasks.extend(self.update_chunk(coord));
                } else {
                    tasks.extend(self.create_chunk(coord));
                }
            }
        }
        tasks
    }

    /// Installs colliders on, or requests collision meshes for, every visible chunk.
    pub fn update_collisions(&mut self) -> WorldTasks {
        let visible: Vec<ChunkCoord> = self.visible_chunks.iter().copied().collect();
        visible
            .into_iter()
            .flat_map(|coord| self.update_collision(coord))
            .collect()
    }

    fn create_chunk(&mut self, coord: ChunkCoord) -> WorldTasks {
        let revision = self.next_revision();
        let chunk = Chunk::new(
            coord,
            &self.layout,
            &self.settings.detail_levels,
            self.needs_voxels,
            revision,
        );
        self.chunks.put(coord, chunk);
        debug!("Created chunk {coord:?}");

        let task: Box<dyn Task<World> + Send> = Box::new(HeightMapTask::new(
            coord,
            revision,
            self.settings.clone(),
            self.sample_center(coord),
        ));
        vec![task]
    }

    /// Center of the height windows of chunk `coord`, in noise samples.
    ///
    /// Block terrain takes one sample per block whatever the mesh scale, so its windows
    /// advance by the chunk's width in blocks. Height terrain samples once per vertex and
    /// scales the mesh afterwards.
    fn sample_center(&self, coord: ChunkCoord) -> Vector2<f32> {
        let coord = Vector2::new(coord.x as f32, coord.y as f32);
        match self.settings.mesh_strategy {
            MeshStrategy::Cubical => coord * self.layout.chunk_width as f32,
            MeshStrategy::Continuous => {
                coord * self.layout.world_size / self.settings.mesh.mesh_scale
            }
        }
    }

    /// Runs `Chunk::update` and turns its decisions into events and mesh builds.
    fn update_chunk(&mut self, coord: ChunkCoord) -> WorldTasks {
        let viewer = self.viewer;
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            self.visible_chunks.remove(&coord);
            return WorldTasks::new();
        };
        let update = chunk.update(viewer, &self.settings.detail_levels);

        let mut tasks = WorldTasks::new();
        if !update.mesh_requests.is_empty() {
            if let Some(source) = chunk.mesh_source() {
                for slot in update.mesh_requests {
                    let lod = chunk.lod_slots()[slot].lod();
                    tasks.push(Box::new(MeshGenerationTask::new(
                        coord,
                        slot,
                        lod,
                        chunk.revision(),
                        source.clone(),
                        self.generator.clone(),
                    )));
                }
            }
        }
        if let Some((slot, mesh)) = update.displayed_mesh {
            let lod = chunk.lod_slots()[slot].lod();
            self.events.push(TerrainEvent::MeshChanged { coord, lod, mesh });
        }
        if let Some(visible) = update.visibility_changed {
            if visible {
                self.visible_chunks.insert(coord);
            } else {
                self.visible_chunks.remove(&coord);
            }
            self.events
                .push(TerrainEvent::VisibilityChanged { coord, visible });
        }
        tasks
    }

    fn update_collision(&mut self, coord: ChunkCoord) -> WorldTasks {
        let viewer = self.viewer;
        let Some(chunk) = self.chunks.peek_mut(&coord) else {
            return WorldTasks::new();
        };
        let update = chunk.update_collision(
            viewer,
            &self.settings.detail_levels,
            self.settings.collider_lod_index,
        );

        let mut tasks = WorldTasks::new();
        if let (Some(slot), Some(source)) = (update.mesh_request, chunk.mesh_source()) {
            let lod = chunk.lod_slots()[slot].lod();
            tasks.push(Box::new(MeshGenerationTask::new(
                coord,
                slot,
                lod,
                chunk.revision(),
                source,
                self.generator.clone(),
            )));
        }
        if let Some(mesh) = update.collider {
            self.events
                .push(TerrainEvent::ColliderInstalled { coord, mesh });
        }
        tasks
    }

    /// Updates a chunk whose data just changed, as if the viewer had moved.
    fn refresh_chunk(&mut self, coord: ChunkCoord) -> WorldTasks {
        let mut tasks = self.update_chunk(coord);
        if self.visible_chunks.contains(&coord) {
            tasks.extend(self.update_collision(coord));
        }
        tasks
    }

    /// Stores freshly generated height layers.
    ///
    /// Block terrain continues with a voxel grid task; height terrain can mesh right away.
    pub fn install_height_layers(
        &mut self,
        coord: ChunkCoord,
        revision: u64,
        layers: HeightLayers,
    ) -> WorldTasks {
        let Some(chunk) = self.chunks.peek_mut(&coord) else {
            debug!("Discarding heights for evicted chunk {coord:?}");
            return WorldTasks::new();
        };
        if chunk.revision() != revision || chunk.has_heights() {
            debug!("Discarding stale heights for chunk {coord:?}");
            return WorldTasks::new();
        }

        chunk.set_heights(Arc::new(layers.ground.clone()));
        if self.needs_voxels {
            let task: Box<dyn Task<World> + Send> = Box::new(VoxelFieldTask::new(
                coord,
                revision,
                self.settings.clone(),
                self.layout,
                layers,
            ));
            return vec![task];
        }
        self.refresh_chunk(coord)
    }

    /// Stores a freshly populated block grid.
    ///
    /// Decoration writes that belong to other chunks go to the shared table; the chunk's
    /// own are queued on it and applied on the next drain.
    pub fn install_voxels(
        &mut self,
        coord: ChunkCoord,
        revision: u64,
        populated: PopulatedVoxels,
    ) -> WorldTasks {
        let Some(chunk) = self.chunks.peek_mut(&coord) else {
            debug!("Discarding voxels for evicted chunk {coord:?}");
            return WorldTasks::new();
        };
        if chunk.revision() != revision || chunk.has_voxels() {
            debug!("Discarding stale voxels for chunk {coord:?}");
            return WorldTasks::new();
        }

        let PopulatedVoxels {
            grid,
            modifications,
        } = populated;
        chunk.set_voxels(grid, modifications.local);
        self.sink.enqueue_generated(modifications.foreign);
        self.refresh_chunk(coord)
    }

    /// Delivers a finished mesh built for `revision`.
    pub fn install_mesh(
        &mut self,
        coord: ChunkCoord,
        slot: usize,
        revision: u64,
        mesh: MeshPayload,
    ) -> WorldTasks {
        let Some(chunk) = self.chunks.peek_mut(&coord) else {
            debug!("Discarding mesh for evicted chunk {coord:?}");
            return WorldTasks::new();
        };
        match chunk.install_mesh(slot, revision, Arc::new(mesh)) {
            MeshDelivery::Installed => trace!("Installed slot {slot} of chunk {coord:?}"),
            MeshDelivery::Stale => debug!("Discarding stale mesh for chunk {coord:?}"),
        }
        self.refresh_chunk(coord)
    }

    /// Frees a slot whose build failed so the next update can request it again.
    ///
    /// # Returns
    /// `true` if the slot has now failed too often and will not be requested again
    /// until the chunk's data changes.
    pub fn abandon_mesh(&mut self, coord: ChunkCoord, slot: usize) -> bool {
        self.chunks
            .peek_mut(&coord)
            .is_some_and(|chunk| chunk.abandon_mesh(slot))
    }

    /// Moves pending modifications into every chunk that has block data, then applies
    /// each chunk's queue and requests fresh meshes where anything changed.
    pub fn drain_modifications(&mut self) -> WorldTasks {
        if !self.needs_voxels {
            self.sink.table().get_mut().clear();
            return WorldTasks::new();
        }

        {
            let mut table = self.sink.table().get_mut();
            if !table.is_empty() {
                for (coord, chunk) in self.chunks.iter_mut() {
                    if chunk.has_voxels() {
                        let batch = table.take(*coord);
                        if !batch.is_empty() {
                            chunk.receive(batch);
                        }
                    }
                }
            }
        }

        let waiting: Vec<ChunkCoord> = self
            .chunks
            .iter()
            .filter(|(_, chunk)| chunk.has_pending_modifications())
            .map(|(coord, _)| *coord)
            .collect();

        let mut tasks = WorldTasks::new();
        for coord in waiting {
            let revision = self.next_revision();
            let layout = self.layout;
            let applied = self
                .chunks
                .peek_mut(&coord)
                .is_some_and(|chunk| chunk.apply_modifications(&layout, revision));
            if applied {
                tasks.extend(self.refresh_chunk(coord));
            }
        }
        tasks
    }

    /// Evicts hidden chunks, least recently updated first, until at most
    /// `max_resident_chunks` remain.
    ///
    /// Modifications an evicted chunk received go back to the shared table, so they are
    /// applied again when the chunk is regenerated. Its edits keep their precedence over
    /// the decorations its neighbours regenerate.
    pub fn evict_excess(&mut self) {
        let excess = self
            .chunks
            .len()
            .saturating_sub(self.settings.max_resident_chunks);
        if excess == 0 {
            return;
        }

        let victims: Vec<ChunkCoord> = self
            .chunks
            .iter()
            .rev()
            .filter(|(_, chunk)| !chunk.is_visible())
            .map(|(coord, _)| *coord)
            .take(excess)
            .collect();

        for coord in victims {
            if let Some(mut chunk) = self.chunks.pop(&coord) {
                let received = chunk.take_received();
                if !received.is_empty() {
                    self.sink.table().get_mut().restore(coord, received);
                }
                debug!("Evicted chunk {coord:?}");
                self.events.push(TerrainEvent::ChunkEvicted { coord });
            }
        }
    }
}
