//! # Voxel Field
//!
//! Builds a chunk's block grid from its height layers, then decorates it.
//!
//! Every column of the grid, border ring included, is filled from the ground layer: stone
//! below the surface, a dirt (or grass) surface block, air above. Decorations are emitted
//! as modifications rather than written directly, since trees and caves near an edge also
//! change the neighbouring chunk.

use cgmath::{Point3, Vector3};

use crate::engine_state::settings::{TerrainSettings, TreeSettings};
use crate::engine_state::terrain::{HeightLayers, NoiseField};

use super::block::block_type::BlockType;
use super::cave_worm::CaveWorm;
use super::coords::{ChunkCoord, ChunkLayout};
use super::modification::{RoutedModifications, VoxelModification};
use super::voxel_grid::VoxelGrid;

/// A freshly populated grid plus the decoration writes it produced.
#[derive(Clone, Debug)]
pub struct PopulatedVoxels {
    /// Terrain without decorations.
    pub grid: VoxelGrid,
    /// Decoration writes, split by destination chunk.
    pub modifications: RoutedModifications,
}

/// Turns height layers into blocks.
pub struct VoxelField<'a> {
    settings: &'a TerrainSettings,
    layout: ChunkLayout,
}

impl<'a> VoxelField<'a> {
    /// Creates a populator for chunks of `layout`.
    pub fn new(settings: &'a TerrainSettings, layout: ChunkLayout) -> Self {
        Self { settings, layout }
    }

    /// Builds the grid of chunk `coord`.
    ///
    /// # Arguments
    /// * `coord` - Chunk being generated
    /// * `layers` - Height windows of `grid_width` samples per side, aligned with the grid
    pub fn populate(&self, coord: ChunkCoord, layers: &HeightLayers) -> PopulatedVoxels {
        let voxel = &self.settings.voxel;
        let width = self.layout.grid_width();
        let height = self.layout.chunk_height;
        let mut grid = VoxelGrid::new(width, height);
        let mut modifications = RoutedModifications::default();

        for gz in 0..width {
            for gx in 0..width {
                let surface = self.surface_level(layers, gx, gz);
                let vegetated = layers
                    .vegetation
                    .as_ref()
                    .map(|v| v.get_or_zero(gx, gz) > voxel.trees.vegetation_threshold)
                    .unwrap_or(false);
                let surface_block = if vegetated {
                    BlockType::GRASS
                } else {
                    BlockType::DIRT
                };

                for y in 0..=surface.min(height - 1) {
                    let block = if y < surface {
                        BlockType::STONE
                    } else {
                        surface_block
                    };
                    grid.set(gx, y, gz, block.as_int());
                }

                let interior = (1..=self.layout.chunk_width).contains(&gx)
                    && (1..=self.layout.chunk_width).contains(&gz);
                if !(interior && vegetated) {
                    continue;
                }
                let tree_density = layers.trees.as_ref().map(|t| t.get_or_zero(gx, gz));
                let column = self.layout.grid_to_world(coord, Point3::new(gx, surface, gz));
                if grows_tree(&voxel.trees, tree_density, column) {
                    for modification in stamp_tree(&voxel.trees, column) {
                        modifications.route(&self.layout, coord, modification);
                    }
                }
            }
        }

        if layers.ground.max_value() > voxel.cave_height_threshold {
            self.carve_cave(coord, layers, &mut modifications);
        }

        PopulatedVoxels {
            grid,
            modifications,
        }
    }

    fn surface_level(&self, layers: &HeightLayers, gx: i32, gz: i32) -> i32 {
        let base = self.settings.voxel.base_land_level as f32;
        let level = (base + layers.ground.get_or_zero(gx, gz)).floor();
        (level as i32).max(0)
    }

    fn carve_cave(
        &self,
        coord: ChunkCoord,
        layers: &HeightLayers,
        modifications: &mut RoutedModifications,
    ) {
        let worm_settings = &self.settings.voxel.worm;
        let (gx, gz) = layers.ground.argmax();
        let (gx, gz) = (gx as i32, gz as i32);
        let start_y = self.surface_level(layers, gx, gz) - worm_settings.start_depth;
        let start = self.layout.grid_to_world(coord, Point3::new(gx, start_y.max(1), gz));

        let noise = NoiseField::new(&worm_settings.noise);
        let worm = CaveWorm::new(&noise, worm_settings);
        let cells = worm.carve(Vector3::new(
            start.x as f32 + 0.5,
            start.y as f32 + 0.5,
            start.z as f32 + 0.5,
        ));
        log::trace!("Cave worm in chunk {:?} carved {} cells", coord, cells.len());
        for cell in cells {
            if cell.y < self.layout.chunk_height {
                modifications.route(
                    &self.layout,
                    coord,
                    VoxelModification::new(cell, BlockType::AIR.as_int()),
                );
            }
        }
    }
}

/// Whether the column whose surface cell is `column` grows a tree.
fn grows_tree(trees: &TreeSettings, tree_density: Option<f32>, column: Point3<i32>) -> bool {
    let Some(density) = tree_density else {
        return false;
    };
    density < trees.tree_threshold
        && column.x.rem_euclid(trees.spacing) == 0
        && column.z.rem_euclid(trees.spacing) == 0
}

/// Trunk and canopy blocks of a tree growing on the surface cell `surface`.
fn stamp_tree(trees: &TreeSettings, surface: Point3<i32>) -> Vec<VoxelModification> {
    let trunk_base = surface.y + trees.height_offset;
    let trunk_top = trunk_base + trees.trunk_height - 1;
    let mut blocks = Vec::new();

    let radius = trees.canopy_radius;
    for dy in -1..=1 {
        let layer_radius = if dy == 1 { (radius - 1).max(0) } else { radius };
        for dz in -layer_radius..=layer_radius {
            for dx in -layer_radius..=layer_radius {
                if dx * dx + dz * dz > layer_radius * layer_radius + 1 {
                    continue;
                }
                if dx == 0 && dz == 0 && dy <= 0 {
                    continue;
                }
                blocks.push(VoxelModification::new(
                    Point3::new(surface.x + dx, trunk_top + dy, surface.z + dz),
                    BlockType::LEAVES.as_int(),
                ));
            }
        }
    }
    for y in trunk_base..=trunk_top {
        blocks.push(VoxelModification::new(
            Point3::new(surface.x, y, surface.z),
            BlockType::WOOD.as_int(),
        ));
    }
    blocks
}
