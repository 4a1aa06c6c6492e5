//! # Voxel Terrain
//!
//! This module contains the chunked representation of the terrain: block grids, the
//! per-chunk state machine, cross-chunk modifications and the world that ties them
//! together.
//!
//! ## Architecture
//!
//! * **Block**: Block types, face directions and texture atlas coordinates
//! * **Coords**: Conversions between world cells, chunk coordinates and grid indices
//! * **VoxelGrid**: A chunk's blocks plus a one-block border copied from its neighbours
//! * **VoxelField**: Fills a grid from height layers and stamps trees and caves
//! * **Chunk**: Tracks data readiness, LOD slots, the collider and pending modifications
//! * **World**: Owns the resident chunks and applies task results to them
//! * **Tasks**: Height and block generation run off the main thread
//!
//! ## Data Flow
//!
//! 1. The world creates a chunk and requests its height layers
//! 2. Block terrain turns the heights into a grid; decorations that leave the grid are
//!    routed to the chunks that own them
//! 3. Edits and routed decorations wait in the shared modification table until their
//!    chunk has blocks, then are applied between mesh builds
//! 4. Every applied change invalidates the chunk's meshes, which are rebuilt on demand

pub mod block;
pub mod cave_worm;
pub mod chunk;
pub mod coords;
pub mod modification;
pub mod tasks;
pub mod voxel_field;
pub mod voxel_grid;
pub mod world;
