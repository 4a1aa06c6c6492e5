//! # Voxel Task System
//!
//! This module contains the tasks that generate chunk data off the main thread.
//! Each task owns its inputs and hands its output back to the `World` on the main thread.
//!
//! - `HeightMapTask`: samples the height layers of a chunk
//! - `VoxelFieldTask`: turns height layers into a block grid with trees and caves

pub mod height_map_task;
pub mod voxel_field_task;
