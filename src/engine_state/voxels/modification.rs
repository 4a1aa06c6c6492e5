//! # Voxel Modifications
//!
//! Block writes that have been decided but not yet applied to a grid, and the routing that
//! delivers each write to every chunk whose grid holds a copy of the cell.
//!
//! A cell is stored in its owner's interior and, when it lies on the chunk's edge, in the
//! border ring of the neighbour across that edge. A write therefore targets the owner plus
//! every chunk that owns one of the cell's six face neighbours. Writes for the chunk being
//! generated are applied locally; all others wait in the shared `ModificationTable` until
//! their chunk has block data.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use cgmath::{Point3, Vector3};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::MtResource;
use crate::error::TerrainError;

use super::block::{block_side::BlockSide, BlockTypeSize};
use super::coords::{cell_of_position, ChunkCoord, ChunkLayout};

/// A pending write of `block_type` to the world cell at `position`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoxelModification {
    /// World cell to overwrite.
    pub position: Point3<i32>,
    /// Block written there. Zero removes the block.
    pub block_type: BlockTypeSize,
}

impl VoxelModification {
    /// Creates a modification.
    pub fn new(position: Point3<i32>, block_type: BlockTypeSize) -> Self {
        Self {
            position,
            block_type,
        }
    }
}

/// Every chunk whose grid stores a copy of `cell`: its owner first, then each distinct
/// chunk owning one of the cell's face neighbours.
pub fn target_chunks(layout: &ChunkLayout, cell: Point3<i32>) -> Vec<ChunkCoord> {
    let owner = layout.chunk_of_cell(cell);
    let mut targets = vec![owner];
    for side in BlockSide::all() {
        let neighbour = layout.chunk_of_cell(cell + side.world_offset());
        if !targets.contains(&neighbour) {
            targets.push(neighbour);
        }
    }
    targets
}

/// Modifications produced while generating one chunk, split by destination.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoutedModifications {
    /// Writes to the generating chunk's own grid.
    pub local: Vec<VoxelModification>,
    /// Writes addressed to other chunks.
    pub foreign: Vec<(ChunkCoord, VoxelModification)>,
}

impl RoutedModifications {
    /// Routes `modification` relative to the chunk `current`.
    pub fn route(&mut self, layout: &ChunkLayout, current: ChunkCoord, modification: VoxelModification) {
        for target in target_chunks(layout, modification.position) {
            if target == current {
                self.local.push(modification);
            } else {
                self.foreign.push((target, modification));
            }
        }
    }
}

/// Writes bound for one chunk, kept apart by origin.
///
/// Generated writes always land before edits: an edit made to a cell is never undone by
/// a tree or cave that a neighbour generates afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModificationBatch {
    /// Writes produced by terrain generation.
    pub generated: Vec<VoxelModification>,
    /// Writes submitted through a `ModificationSink`.
    pub edits: Vec<VoxelModification>,
}

impl ModificationBatch {
    /// A batch of generated writes only.
    pub fn generated(generated: Vec<VoxelModification>) -> Self {
        Self {
            generated,
            edits: Vec::new(),
        }
    }

    /// A batch of edits only.
    pub fn edits(edits: Vec<VoxelModification>) -> Self {
        Self {
            generated: Vec::new(),
            edits,
        }
    }

    /// Appends `other` after what this batch already holds, per origin.
    pub fn append(&mut self, other: ModificationBatch) {
        self.generated.extend(other.generated);
        self.edits.extend(other.edits);
    }

    /// Total number of writes.
    pub fn len(&self) -> usize {
        self.generated.len() + self.edits.len()
    }

    /// Whether the batch holds no writes.
    pub fn is_empty(&self) -> bool {
        self.generated.is_empty() && self.edits.is_empty()
    }
}

/// Modifications waiting for their chunk to have block data, keyed by chunk.
#[derive(Debug, Default)]
pub struct ModificationTable {
    pending: HashMap<ChunkCoord, ModificationBatch>,
}

impl ModificationTable {
    /// Queues a generated write for `coord`.
    pub fn push_generated(&mut self, coord: ChunkCoord, modification: VoxelModification) {
        self.pending
            .entry(coord)
            .or_default()
            .generated
            .push(modification);
    }

    /// Queues an edit for every chunk that stores its cell.
    pub fn push_edit(&mut self, layout: &ChunkLayout, modification: VoxelModification) {
        for target in target_chunks(layout, modification.position) {
            self.pending.entry(target).or_default().edits.push(modification);
        }
    }

    /// Removes and returns everything queued for `coord`, oldest first.
    pub fn take(&mut self, coord: ChunkCoord) -> ModificationBatch {
        self.pending.remove(&coord).unwrap_or_default()
    }

    /// Puts `batch` back in front of whatever is queued for `coord`.
    pub fn restore(&mut self, coord: ChunkCoord, mut batch: ModificationBatch) {
        if batch.is_empty() {
            return;
        }
        if let Some(queued) = self.pending.remove(&coord) {
            batch.append(queued);
        }
        self.pending.insert(coord, batch);
    }

    /// Number of queued modifications across all chunks.
    pub fn len(&self) -> usize {
        self.pending.values().map(ModificationBatch::len).sum()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.values().all(ModificationBatch::is_empty)
    }

    /// Drops everything queued.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Every edit accepted from outside, in order.
///
/// Together with the settings this is enough to regenerate an edited world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EditLog {
    /// Accepted edits, oldest first.
    pub edits: Vec<VoxelModification>,
}

impl EditLog {
    /// Loads an edit log from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TerrainError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| TerrainError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Writes the edit log as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TerrainError> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)?;
        fs::write(path, json).map_err(|source| TerrainError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A cloneable handle through which any thread can submit block edits.
///
/// Edits are logged and queued in the shared table; the chunk manager moves them into
/// their chunks on its next drain. No chunk state is touched from the submitting thread.
#[derive(Clone)]
pub struct ModificationSink {
    layout: ChunkLayout,
    accepts_edits: bool,
    table: MtResource<ModificationTable>,
    edit_log: MtResource<EditLog>,
}

impl ModificationSink {
    /// Creates a sink with an empty table and log.
    ///
    /// # Arguments
    /// * `layout` - Chunk dimensions used for routing
    /// * `accepts_edits` - `false` for terrains without block data; edits are then dropped
    pub fn new(layout: ChunkLayout, accepts_edits: bool) -> Self {
        Self {
            layout,
            accepts_edits,
            table: MtResource::new(ModificationTable::default()),
            edit_log: MtResource::new(EditLog::default()),
        }
    }

    /// Places `block_type` in the cell containing world position `position`.
    pub fn edit_at(&self, position: Vector3<f32>, block_type: BlockTypeSize) -> bool {
        self.submit(VoxelModification::new(cell_of_position(position), block_type))
    }

    /// Logs `modification` and queues it for every chunk storing its cell.
    ///
    /// # Returns
    /// `false` if this terrain has no block data and the edit was dropped.
    pub fn submit(&self, modification: VoxelModification) -> bool {
        if !self.accepts_edits {
            debug!("Dropping edit {modification:?}: terrain has no block data");
            return false;
        }
        self.edit_log.update(|log| log.edits.push(modification));
        self.table
            .update(|table| table.push_edit(&self.layout, modification));
        true
    }

    /// Queues writes produced by generation. They are not logged, since regenerating the
    /// world produces them again.
    pub fn enqueue_generated(&self, foreign: Vec<(ChunkCoord, VoxelModification)>) {
        if foreign.is_empty() {
            return;
        }
        self.table.update(|table| {
            for (coord, modification) in foreign {
                table.push_generated(coord, modification);
            }
        });
    }

    /// The shared pending table.
    pub fn table(&self) -> &MtResource<ModificationTable> {
        &self.table
    }

    /// A copy of the edit log.
    pub fn edit_log(&self) -> EditLog {
        self.edit_log.get().clone()
    }

    /// Submits every edit of `log`, in order.
    pub fn replay(&self, log: &EditLog) {
        for modification in &log.edits {
            self.submit(*modification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ChunkLayout {
        ChunkLayout::new(18.0, 64)
    }

    #[test]
    fn test_interior_cell_targets_only_its_owner() {
        let layout = layout();
        assert_eq!(
            target_chunks(&layout, Point3::new(0, 10, 0)),
            vec![ChunkCoord::new(0, 0)]
        );
    }

    #[test]
    fn test_edge_cell_targets_each_differing_neighbour() {
        let layout = layout();
        // x = 8 is the last column of chunk 0; x + 1 belongs to chunk 1.
        assert_eq!(
            target_chunks(&layout, Point3::new(8, 10, 0)),
            vec![ChunkCoord::new(0, 0), ChunkCoord::new(1, 0)]
        );
        // z = -9 is the first row of chunk 0; z - 1 belongs to chunk (0, -1).
        assert_eq!(
            target_chunks(&layout, Point3::new(0, 10, -9)),
            vec![ChunkCoord::new(0, 0), ChunkCoord::new(0, -1)]
        );
    }

    #[test]
    fn test_corner_cell_targets_both_edge_neighbours_only() {
        let layout = layout();
        let mut targets = target_chunks(&layout, Point3::new(-9, 0, 8));
        assert_eq!(targets[0], ChunkCoord::new(0, 0), "owner comes first");
        targets.sort_by_key(|c| (c.x, c.y));
        assert_eq!(
            targets,
            vec![ChunkCoord::new(-1, 0), ChunkCoord::new(0, 0), ChunkCoord::new(0, 1)],
            "the diagonal chunk shares no face with the cell"
        );
    }

    #[test]
    fn test_route_splits_local_and_foreign() {
        let layout = layout();
        let mut routed = RoutedModifications::default();
        let modification = VoxelModification::new(Point3::new(8, 5, 3), 4);
        routed.route(&layout, ChunkCoord::new(1, 0), modification);
        assert_eq!(routed.local, vec![modification], "cell sits in chunk 1's border ring");
        assert_eq!(routed.foreign, vec![(ChunkCoord::new(0, 0), modification)]);
    }

    #[test]
    fn test_sink_logs_and_queues_edits() {
        let sink = ModificationSink::new(layout(), true);
        assert!(sink.edit_at(Vector3::new(8.5, 40.0, 0.5), 3));
        assert_eq!(sink.edit_log().edits.len(), 1);
        let mut table = sink.table().get_mut();
        assert_eq!(table.len(), 2);
        assert_eq!(table.take(ChunkCoord::new(1, 0)).len(), 1);
        assert_eq!(table.take(ChunkCoord::new(1, 0)).len(), 0);
    }

    #[test]
    fn test_sink_without_block_data_drops_edits() {
        let sink = ModificationSink::new(layout(), false);
        assert!(!sink.edit_at(Vector3::new(0.0, 0.0, 0.0), 3));
        assert!(sink.table().get().is_empty());
        assert!(sink.edit_log().edits.is_empty());
    }

    #[test]
    fn test_restore_keeps_older_modifications_first() {
        let coord = ChunkCoord::new(2, 2);
        let older = VoxelModification::new(Point3::new(1, 1, 1), 1);
        let newer = VoxelModification::new(Point3::new(1, 1, 1), 0);
        let edit = VoxelModification::new(Point3::new(1, 2, 1), 3);
        let mut table = ModificationTable::default();
        table.push_generated(coord, newer);
        table.restore(
            coord,
            ModificationBatch {
                generated: vec![older],
                edits: vec![edit],
            },
        );
        assert_eq!(
            table.take(coord),
            ModificationBatch {
                generated: vec![older, newer],
                edits: vec![edit],
            }
        );
    }

    #[test]
    fn test_generated_writes_and_edits_queue_apart() {
        let layout = layout();
        let sink = ModificationSink::new(layout, true);
        let cell = Point3::new(3, 10, 3);
        let leaves = VoxelModification::new(cell, 5);
        sink.submit(VoxelModification::new(cell, 0));
        sink.enqueue_generated(vec![(ChunkCoord::new(0, 0), leaves)]);

        let batch = sink.table().get_mut().take(ChunkCoord::new(0, 0));
        assert_eq!(batch.generated, vec![leaves]);
        assert_eq!(batch.edits, vec![VoxelModification::new(cell, 0)]);
        assert_eq!(sink.edit_log().edits.len(), 1, "generated writes are not logged");
    }

    #[test]
    fn test_edit_log_json_layout() {
        let log = EditLog {
            edits: vec![VoxelModification::new(Point3::new(1, 2, 3), 5)],
        };
        let json = serde_json::to_string(&log).unwrap();
        assert_eq!(
            json,
            r#"{"edits":[{"position":{"x":1,"y":2,"z":3},"block_type":5}]}"#
        );
        let parsed: EditLog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, log);
    }
}
