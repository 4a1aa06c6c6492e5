//! Per-detail-level mesh slots.

use std::sync::Arc;

use crate::engine_state::rendering::meshing::MeshPayload;

/// Failed builds after which a slot stops being requested until its data changes.
pub const MAX_MESH_BUILD_ATTEMPTS: u32 = 3;

/// Progress of one slot's mesh.
#[derive(Clone, Debug, Default)]
pub enum LodState {
    /// No mesh and no build in flight.
    #[default]
    Empty,
    /// A build has been published and its result has not arrived.
    Requested,
    /// The mesh is available.
    Ready(Arc<MeshPayload>),
    /// Every allowed build failed.
    Failed,
}

/// The mesh of a chunk at one entry of the detail table.
///
/// A slot is requested at most once until it is invalidated.
#[derive(Clone, Debug)]
pub struct LodSlot {
    lod: usize,
    state: LodState,
    failed_builds: u32,
}

impl LodSlot {
    /// Creates an empty slot for level of detail `lod`.
    pub fn new(lod: usize) -> Self {
        Self {
            lod,
            state: LodState::Empty,
            failed_builds: 0,
        }
    }

    /// Level of detail the slot's mesh is built at.
    pub fn lod(&self) -> usize {
        self.lod
    }

    /// Current state.
    pub fn state(&self) -> &LodState {
        &self.state
    }

    /// Whether a request may be issued.
    pub fn is_empty(&self) -> bool {
        matches!(self.state, LodState::Empty)
    }

    /// Whether a build is in flight.
    pub fn is_requested(&self) -> bool {
        matches!(self.state, LodState::Requested)
    }

    /// The finished mesh, if any.
    pub fn mesh(&self) -> Option<&Arc<MeshPayload>> {
        match &self.state {
            LodState::Ready(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// `Empty -> Requested`.
    ///
    /// # Returns
    /// `false` if the slot was not empty and nothing changed.
    pub fn mark_requested(&mut self) -> bool {
        if !self.is_empty() {
            return false;
        }
        self.state = LodState::Requested;
        true
    }

    /// `Requested -> Ready`. A mesh arriving for a slot that is not waiting is ignored.
    pub fn install(&mut self, mesh: Arc<MeshPayload>) -> bool {
        if !self.is_requested() {
            return false;
        }
        self.state = LodState::Ready(mesh);
        true
    }

    /// `Requested -> Empty` after a failed build, or `Requested -> Failed` once
    /// `MAX_MESH_BUILD_ATTEMPTS` builds have failed.
    ///
    /// # Returns
    /// `true` if the slot just gave up.
    pub fn fail(&mut self) -> bool {
        if !self.is_requested() {
            return false;
        }
        self.failed_builds += 1;
        if self.failed_builds >= MAX_MESH_BUILD_ATTEMPTS {
            self.state = LodState::Failed;
            true
        } else {
            self.state = LodState::Empty;
            false
        }
    }

    /// Back to `Empty`, whatever the current state. The data changed, so earlier
    /// failures no longer count.
    pub fn invalidate(&mut self) {
        self.state = LodState::Empty;
        self.failed_builds = 0;
    }
}
