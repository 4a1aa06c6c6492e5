//! # Chunk Module
//!
//! This module provides the `Chunk` struct, the per-coordinate state machine of the
//! streamed terrain.
//!
//! ## Lifecycle
//!
//! 1. Created with no data; the world requests its height layers
//! 2. Heights arrive; block terrain additionally requests its voxel grid
//! 3. Data-ready: `update()` picks a detail level by distance and requests meshes on demand
//! 4. Meshes arrive into `LodSlot`s; the collider slot is handed to physics up close
//! 5. Modifications invalidate every slot and the collider, and bump the revision
//!
//! A chunk never talks to the work queue itself. `update()` and `update_collision()`
//! return what should happen and the world turns that into tasks and events.

use std::sync::Arc;

use cgmath::Vector2;
use log::debug;

use crate::engine_state::rendering::meshing::{MeshPayload, MeshSource};
use crate::engine_state::settings::LodInfo;
use crate::engine_state::terrain::HeightField;

use super::coords::{ChunkCoord, ChunkLayout};
use super::modification::{ModificationBatch, VoxelModification};
use super::voxel_grid::VoxelGrid;

pub mod lod;

use lod::LodSlot;

/// Distance from the chunk bounds under which the collider mesh is installed.
pub const COLLIDER_GENERATION_DISTANCE_THRESHOLD: f32 = 5.0;

/// Horizontal square covered by a chunk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkBounds {
    center: Vector2<f32>,
    half_size: f32,
}

impl ChunkBounds {
    /// Creates a square of side `size` centered on `center`.
    pub fn new(center: Vector2<f32>, size: f32) -> Self {
        Self {
            center,
            half_size: size / 2.0,
        }
    }

    /// Squared distance from `point` to the nearest point of the square; zero inside it.
    pub fn sqr_distance(&self, point: Vector2<f32>) -> f32 {
        let dx = ((point.x - self.center.x).abs() - self.half_size).max(0.0);
        let dy = ((point.y - self.center.y).abs() - self.half_size).max(0.0);
        dx * dx + dy * dy
    }
}

/// What a call to `Chunk::update` decided.
#[derive(Debug, Default)]
pub struct ChunkUpdate {
    /// The new visibility, if it changed.
    pub visibility_changed: Option<bool>,
    /// A mesh that should now be displayed, with the slot it came from.
    pub displayed_mesh: Option<(usize, Arc<MeshPayload>)>,
    /// Slots whose meshes should be built.
    pub mesh_requests: Vec<usize>,
}

/// What a call to `Chunk::update_collision` decided.
#[derive(Debug, Default)]
pub struct CollisionUpdate {
    /// The collider slot should be built.
    pub mesh_request: Option<usize>,
    /// A mesh that should be installed as the physics collider.
    pub collider: Option<Arc<MeshPayload>>,
}

/// The outcome of delivering a mesh to a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshDelivery {
    /// The mesh was stored in its slot.
    Installed,
    /// The mesh was built from data the chunk no longer holds and was dropped.
    Stale,
}

/// One square of the terrain grid.
pub struct Chunk {
    coord: ChunkCoord,
    bounds: ChunkBounds,
    needs_voxels: bool,
    ground: Option<Arc<HeightField>>,
    voxels: Option<Arc<VoxelGrid>>,
    lod_slots: Vec<LodSlot>,
    previous_lod_index: Option<usize>,
    visible: bool,
    has_collider: bool,
    pending: ModificationBatch,
    received: ModificationBatch,
    revision: u64,
}

impl Chunk {
    /// Creates a chunk with no data.
    ///
    /// # Arguments
    /// * `coord` - Position on the chunk grid
    /// * `layout` - Chunk dimensions
    /// * `detail_levels` - Distance bands; one slot is created per band
    /// * `needs_voxels` - Whether meshing requires a block grid on top of the heights
    /// * `revision` - Initial revision, unique across every chunk of the world
    pub fn new(
        coord: ChunkCoord,
        layout: &ChunkLayout,
        detail_levels: &[LodInfo],
        needs_voxels: bool,
        revision: u64,
    ) -> Self {
        Self {
            coord,
            bounds: ChunkBounds::new(layout.chunk_center(coord), layout.world_size),
            needs_voxels,
            ground: None,
            voxels: None,
            lod_slots: detail_levels.iter().map(|info| LodSlot::new(info.lod)).collect(),
            previous_lod_index: None,
            visible: false,
            has_collider: false,
            pending: ModificationBatch::default(),
            received: ModificationBatch::default(),
            revision,
        }
    }

    /// Position on the chunk grid.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Horizontal extent.
    pub fn bounds(&self) -> &ChunkBounds {
        &self.bounds
    }

    /// Changes whenever the data meshes are built from changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the chunk is within view distance.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether a collider has been installed since the last invalidation.
    pub fn has_collider(&self) -> bool {
        self.has_collider
    }

    /// The mesh slots, in detail-table order.
    pub fn lod_slots(&self) -> &[LodSlot] {
        &self.lod_slots
    }

    /// The block grid, once generated.
    pub fn voxels(&self) -> Option<&Arc<VoxelGrid>> {
        self.voxels.as_ref()
    }

    /// Whether the ground heights have arrived.
    pub fn has_heights(&self) -> bool {
        self.ground.is_some()
    }

    /// Whether the block grid has arrived.
    pub fn has_voxels(&self) -> bool {
        self.voxels.is_some()
    }

    /// Whether everything meshing needs has arrived.
    pub fn has_data(&self) -> bool {
        self.ground.is_some() && (!self.needs_voxels || self.voxels.is_some())
    }

    /// Whether modifications are waiting to be applied.
    pub fn has_pending_modifications(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Stores the ground heights.
    pub fn set_heights(&mut self, ground: Arc<HeightField>) {
        self.ground = Some(ground);
    }

    /// Stores the block grid along with the decoration writes generation produced for it.
    pub fn set_voxels(&mut self, grid: VoxelGrid, local: Vec<VoxelModification>) {
        self.voxels = Some(Arc::new(grid));
        self.pending.generated.extend(local);
    }

    /// Accepts modifications drained from the shared table.
    ///
    /// They are remembered so they can be handed back if the chunk is evicted, and so
    /// edits can be laid over generated writes that arrive later.
    pub fn receive(&mut self, batch: ModificationBatch) {
        self.received.append(batch.clone());
        self.pending.append(batch);
    }

    /// Everything received from the shared table, for re-queueing on eviction.
    pub fn take_received(&mut self) -> ModificationBatch {
        std::mem::take(&mut self.received)
    }

    /// An immutable snapshot of the data meshes are built from.
    pub fn mesh_source(&self) -> Option<MeshSource> {
        if self.needs_voxels {
            self.voxels.clone().map(MeshSource::Voxels)
        } else {
            self.ground.clone().map(MeshSource::Heights)
        }
    }

    /// Re-evaluates visibility and the displayed level of detail for a viewer at `viewer`.
    ///
    /// Nothing happens until the chunk has data. New mesh requests are held back while
    /// modifications are waiting, so no mesh is built from data about to change.
    pub fn update(&mut self, viewer: Vector2<f32>, detail_levels: &[LodInfo]) -> ChunkUpdate {
        let mut update = ChunkUpdate::default();
        if !self.has_data() {
            return update;
        }
        let Some(max_view) = detail_levels.last() else {
            return update;
        };

        let sqr_distance = self.bounds.sqr_distance(viewer);
        let was_visible = self.visible;
        let visible = sqr_distance <= max_view.sqr_visible_dst_threshold();

        if visible {
            let lod_index = detail_levels[..detail_levels.len() - 1]
                .iter()
                .position(|info| sqr_distance <= info.sqr_visible_dst_threshold())
                .unwrap_or(detail_levels.len() - 1);

            if self.previous_lod_index != Some(lod_index) {
                let slot = &mut self.lod_slots[lod_index];
                if let Some(mesh) = slot.mesh() {
                    self.previous_lod_index = Some(lod_index);
                    update.displayed_mesh = Some((lod_index, mesh.clone()));
                } else if self.pending.is_empty() && slot.mark_requested() {
                    update.mesh_requests.push(lod_index);
                }
            }
        }

        if was_visible != visible {
            self.visible = visible;
            update.visibility_changed = Some(visible);
        }
        update
    }

    /// Requests and installs the collider mesh as the viewer approaches.
    ///
    /// # Arguments
    /// * `viewer` - Horizontal viewer position
    /// * `detail_levels` - Distance bands
    /// * `collider_index` - Band whose slot doubles as the collider
    pub fn update_collision(
        &mut self,
        viewer: Vector2<f32>,
        detail_levels: &[LodInfo],
        collider_index: usize,
    ) -> CollisionUpdate {
        let mut update = CollisionUpdate::default();
        if self.has_collider || !self.has_data() {
            return update;
        }
        let (Some(info), Some(slot)) = (
            detail_levels.get(collider_index),
            self.lod_slots.get_mut(collider_index),
        ) else {
            return update;
        };

        let sqr_distance = self.bounds.sqr_distance(viewer);
        if sqr_distance < info.sqr_visible_dst_threshold()
            && self.pending.is_empty()
            && slot.mark_requested()
        {
            update.mesh_request = Some(collider_index);
        }

        let threshold = COLLIDER_GENERATION_DISTANCE_THRESHOLD;
        if sqr_distance < threshold * threshold {
            if let Some(mesh) = slot.mesh() {
                update.collider = Some(mesh.clone());
                self.has_collider = true;
            }
        }
        update
    }

    /// Applies every waiting modification to the block grid.
    ///
    /// Generated writes go first. If there were any, every edit this chunk ever received
    /// is written again on top, so an edit always outlives decorations that reach the
    /// chunk after it. Deferred while any mesh build is in flight. The grid is copied
    /// first if a meshing task still holds a snapshot of it. Applying invalidates every
    /// slot and the collider.
    ///
    /// # Returns
    /// `true` if the grid changed and the chunk now carries `next_revision`.
    pub fn apply_modifications(&mut self, layout: &ChunkLayout, next_revision: u64) -> bool {
        if self.pending.is_empty() || self.lod_slots.iter().any(LodSlot::is_requested) {
            return false;
        }
        let Some(voxels) = self.voxels.as_mut() else {
            return false;
        };

        let ModificationBatch { generated, edits } = std::mem::take(&mut self.pending);
        let edits = if generated.is_empty() {
            &edits
        } else {
            &self.received.edits
        };
        let grid = Arc::make_mut(voxels);
        for modification in generated.iter().chain(edits) {
            let cell = layout.world_to_grid(self.coord, modification.position);
            grid.set_at(cell, modification.block_type);
        }

        for slot in &mut self.lod_slots {
            slot.invalidate();
        }
        self.has_collider = false;
        self.previous_lod_index = None;
        self.revision = next_revision;
        debug!("Applied modifications to chunk {:?}", self.coord);
        true
    }

    /// Delivers a finished mesh to slot `slot_index`.
    pub fn install_mesh(
        &mut self,
        slot_index: usize,
        revision: u64,
        mesh: Arc<MeshPayload>,
    ) -> MeshDelivery {
        let Some(slot) = self.lod_slots.get_mut(slot_index) else {
            return MeshDelivery::Stale;
        };
        if revision != self.revision {
            if slot.is_requested() {
                slot.invalidate();
            }
            return MeshDelivery::Stale;
        }
        if slot.install(mesh) {
            MeshDelivery::Installed
        } else {
            MeshDelivery::Stale
        }
    }

    /// Frees slot `slot_index` after its build failed, so it can be requested again.
    ///
    /// # Returns
    /// `true` if the slot has failed too often and stays unrequested until the chunk's
    /// data changes.
    pub fn abandon_mesh(&mut self, slot_index: usize) -> bool {
        self.lod_slots
            .get_mut(slot_index)
            .is_some_and(LodSlot::fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use cgmath::Point3;

    const EPSILON: f32 = 1e-6;

    fn detail_levels() -> Vec<LodInfo> {
        vec![
            LodInfo {
                lod: 0,
                visible_dst_threshold: 10.0,
            },
            LodInfo {
                lod: 2,
                visible_dst_threshold: 30.0,
            },
        ]
    }

    fn layout() -> ChunkLayout {
        ChunkLayout::new(18.0, 8)
    }

    fn ready_chunk(coord: ChunkCoord) -> Chunk {
        let layout = layout();
        let mut chunk = Chunk::new(coord, &layout, &detail_levels(), true, 1);
        chunk.set_heights(Arc::new(HeightField::flat(20, 20, 0.0)));
        chunk.set_voxels(VoxelGrid::new(layout.grid_width(), layout.chunk_height), Vec::new());
        chunk
    }

    #[test]
    fn test_bounds_distance_is_zero_inside() {
        let bounds = ChunkBounds::new(Vector2::new(18.0, 0.0), 18.0);
        assert!(bounds.sqr_distance(Vector2::new(20.0, 5.0)).abs() < EPSILON);
        assert!((bounds.sqr_distance(Vector2::new(30.0, 0.0)) - 9.0).abs() < EPSILON);
        assert!((bounds.sqr_distance(Vector2::new(30.0, 13.0)) - 25.0).abs() < EPSILON);
    }

    #[test]
    fn test_update_waits_for_data() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0), &layout(), &detail_levels(), true, 1);
        chunk.set_heights(Arc::new(HeightField::flat(20, 20, 0.0)));
        let update = chunk.update(Vector2::new(0.0, 0.0), &detail_levels());
        assert!(update.visibility_changed.is_none());
        assert!(update.mesh_requests.is_empty(), "block terrain also needs its voxels");
    }

    #[test]
    fn test_update_picks_slot_by_distance_and_requests_once() {
        let mut chunk = ready_chunk(ChunkCoord::new(1, 0));
        // 20 units from the bounds: past the first band, inside the second.
        let viewer = Vector2::new(-11.0, 0.0);
        let update = chunk.update(viewer, &detail_levels());
        assert_eq!(update.visibility_changed, Some(true));
        assert_eq!(update.mesh_requests, vec![1]);

        let update = chunk.update(viewer, &detail_levels());
        assert!(update.visibility_changed.is_none());
        assert!(update.mesh_requests.is_empty(), "slot 1 is already in flight");
    }

    #[test]
    fn test_ready_slot_is_displayed() {
        let mut chunk = ready_chunk(ChunkCoord::new(0, 0));
        let viewer = Vector2::new(0.0, 0.0);
        chunk.update(viewer, &detail_levels());
        let mesh = Arc::new(MeshPayload::default());
        assert_eq!(chunk.install_mesh(0, 1, mesh), MeshDelivery::Installed);

        let update = chunk.update(viewer, &detail_levels());
        assert_eq!(update.displayed_mesh.map(|(slot, _)| slot), Some(0));
        assert!(chunk.update(viewer, &detail_levels()).displayed_mesh.is_none());
    }

    #[test]
    fn test_leaving_view_hides_chunk() {
        let mut chunk = ready_chunk(ChunkCoord::new(0, 0));
        chunk.update(Vector2::new(0.0, 0.0), &detail_levels());
        let update = chunk.update(Vector2::new(100.0, 0.0), &detail_levels());
        assert_eq!(update.visibility_changed, Some(false));
        assert!(!chunk.is_visible());
    }

    #[test]
    fn test_collider_requested_then_installed_once() {
        let mut chunk = ready_chunk(ChunkCoord::new(0, 0));
        let viewer = Vector2::new(0.0, 0.0);
        let update = chunk.update_collision(viewer, &detail_levels(), 0);
        assert_eq!(update.mesh_request, Some(0));
        assert!(update.collider.is_none());

        chunk.install_mesh(0, 1, Arc::new(MeshPayload::default()));
        let update = chunk.update_collision(viewer, &detail_levels(), 0);
        assert!(update.collider.is_some());
        assert!(chunk.has_collider());
        assert!(chunk.update_collision(viewer, &detail_levels(), 0).collider.is_none());
    }

    #[test]
    fn test_modifications_wait_for_in_flight_meshes() {
        let layout = layout();
        let mut chunk = ready_chunk(ChunkCoord::new(0, 0));
        chunk.update(Vector2::new(0.0, 0.0), &detail_levels());
        let modification = VoxelModification::new(Point3::new(0, 3, 0), BlockType::STONE.as_int());
        chunk.receive(ModificationBatch::edits(vec![modification]));

        assert!(!chunk.apply_modifications(&layout, 2), "slot 0 is still building");
        chunk.install_mesh(0, 1, Arc::new(MeshPayload::default()));
        assert!(chunk.apply_modifications(&layout, 2));
        assert_eq!(chunk.revision(), 2);
        assert!(chunk.lod_slots().iter().all(LodSlot::is_empty));

        let grid = chunk.voxels().unwrap();
        let cell = layout.world_to_grid(chunk.coord(), modification.position);
        assert!(grid.is_solid(cell.x, cell.y, cell.z));
    }

    #[test]
    fn test_applying_a_modification_twice_matches_once() {
        let layout = layout();
        let modification = VoxelModification::new(Point3::new(8, 2, -9), BlockType::WOOD.as_int());

        let mut once = ready_chunk(ChunkCoord::new(0, 0));
        once.receive(ModificationBatch::edits(vec![modification]));
        once.apply_modifications(&layout, 2);

        let mut twice = ready_chunk(ChunkCoord::new(0, 0));
        twice.receive(ModificationBatch::edits(vec![modification, modification]));
        twice.apply_modifications(&layout, 2);
        twice.receive(ModificationBatch::edits(vec![modification]));
        twice.apply_modifications(&layout, 3);

        assert_eq!(once.voxels().unwrap(), twice.voxels().unwrap());
    }

    #[test]
    fn test_snapshot_survives_modification() {
        let layout = layout();
        let mut chunk = ready_chunk(ChunkCoord::new(0, 0));
        let snapshot = chunk.voxels().cloned().unwrap();
        chunk.receive(ModificationBatch::edits(vec![VoxelModification::new(
            Point3::new(0, 1, 0),
            1,
        )]));
        assert!(chunk.apply_modifications(&layout, 2));
        assert_eq!(snapshot.count_solid(), 0, "a meshing task's copy must not change");
        assert_eq!(chunk.voxels().unwrap().count_solid(), 1);
    }

    #[test]
    fn test_stale_mesh_is_dropped() {
        let mut chunk = ready_chunk(ChunkCoord::new(0, 0));
        chunk.update(Vector2::new(0.0, 0.0), &detail_levels());
        let delivery = chunk.install_mesh(0, 99, Arc::new(MeshPayload::default()));
        assert_eq!(delivery, MeshDelivery::Stale);
        assert!(chunk.lod_slots()[0].is_empty(), "the slot may be requested again");
    }

    #[test]
    fn test_evicted_chunk_returns_received_modifications() {
        let mut chunk = ready_chunk(ChunkCoord::new(0, 0));
        let modification = VoxelModification::new(Point3::new(1, 1, 1), 2);
        chunk.receive(ModificationBatch::generated(vec![modification]));
        chunk.set_voxels(VoxelGrid::new(2, 2), vec![VoxelModification::new(Point3::new(0, 0, 0), 5)]);
        assert_eq!(
            chunk.take_received(),
            ModificationBatch::generated(vec![modification]),
            "writes from its own generation are not handed back"
        );
        assert!(chunk.take_received().is_empty());
    }

    #[test]
    fn test_later_generated_writes_never_override_edits() {
        let layout = layout();
        let mut chunk = ready_chunk(ChunkCoord::new(0, 0));
        let cell = Point3::new(2, 3, 1);
        chunk.receive(ModificationBatch::edits(vec![VoxelModification::new(
            cell,
            BlockType::WOOD.as_int(),
        )]));
        assert!(chunk.apply_modifications(&layout, 2));

        // A neighbour generated afterwards drops leaves on the edited cell.
        chunk.receive(ModificationBatch::generated(vec![VoxelModification::new(
            cell,
            BlockType::LEAVES.as_int(),
        )]));
        assert!(chunk.apply_modifications(&layout, 3));

        let grid_cell = layout.world_to_grid(chunk.coord(), cell);
        assert_eq!(
            chunk.voxels().unwrap().get(grid_cell.x, grid_cell.y, grid_cell.z),
            BlockType::WOOD.as_int()
        );
    }

    #[test]
    fn test_generated_writes_in_the_same_batch_land_under_edits() {
        let layout = layout();
        let mut chunk = ready_chunk(ChunkCoord::new(0, 0));
        let cell = Point3::new(-4, 5, 0);
        chunk.receive(ModificationBatch {
            generated: vec![VoxelModification::new(cell, BlockType::LEAVES.as_int())],
            edits: vec![VoxelModification::new(cell, BlockType::AIR.as_int())],
        });
        assert!(chunk.apply_modifications(&layout, 2));

        let grid_cell = layout.world_to_grid(chunk.coord(), cell);
        assert!(!chunk.voxels().unwrap().is_solid(grid_cell.x, grid_cell.y, grid_cell.z));
    }

    #[test]
    fn test_failing_slot_stops_being_requested_until_data_changes() {
        let layout = layout();
        let mut chunk = ready_chunk(ChunkCoord::new(0, 0));
        let viewer = Vector2::new(0.0, 0.0);
        for attempt in 1..=lod::MAX_MESH_BUILD_ATTEMPTS {
            assert_eq!(chunk.update(viewer, &detail_levels()).mesh_requests, vec![0]);
            let gave_up = chunk.abandon_mesh(0);
            assert_eq!(gave_up, attempt == lod::MAX_MESH_BUILD_ATTEMPTS);
        }
        assert!(chunk.update(viewer, &detail_levels()).mesh_requests.is_empty());

        chunk.receive(ModificationBatch::edits(vec![VoxelModification::new(
            Point3::new(0, 1, 0),
            BlockType::STONE.as_int(),
        )]));
        assert!(chunk.apply_modifications(&layout, 2));
        assert_eq!(chunk.update(viewer, &detail_levels()).mesh_requests, vec![0]);
    }
}
