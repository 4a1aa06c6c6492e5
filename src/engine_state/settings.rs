//! # Terrain Settings
//!
//! Serializable configuration for every stage of the pipeline. All structs implement
//! `Default` with values that stream a reasonable world out of the box, and every section
//! has a `validate()` that clamps out-of-range values instead of rejecting them, so a
//! hand-edited settings file always yields renderable terrain.
//!
//! Settings are loaded from and saved to JSON:
//!
//! ```no_run
//! use voxel_terrain::engine_state::settings::TerrainSettings;
//!
//! let mut settings = TerrainSettings::load("terrain.json")?;
//! settings.validate();
//! # Ok::<(), voxel_terrain::error::TerrainError>(())
//! ```

use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::engine_state::rendering::meshing::MeshStrategy;
use crate::engine_state::terrain::height_curve::HeightCurve;
use crate::engine_state::voxels::block::BlockTextureTable;
use crate::error::TerrainError;

/// Number of levels of detail a continuous mesh can be generated at.
pub const NUM_SUPPORTED_LODS: usize = 5;

/// Chunk sizes (space between vertices at LOD 0) selectable through `MeshSettings`.
pub const SUPPORTED_CHUNK_SIZES: [usize; 10] = [16, 48, 72, 96, 120, 144, 168, 192, 216, 240];

/// Flat shading duplicates every vertex, so only the smallest sizes are allowed with it.
pub const NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES: usize = 3;

/// How a noise window is normalized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeMode {
    /// Remap each window into [0, 1] using the window's own min/max.
    ///
    /// Neighbouring windows are normalized independently, so they do not tile.
    Local,
    /// Divide by the estimated maximum amplitude shared by every window, so windows tile.
    #[default]
    Global,
}

/// Parameters of the multi-octave noise sampler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    /// Normalization applied to each sampled window.
    pub normalize_mode: NormalizeMode,
    /// Feature size in samples. Larger values stretch the noise.
    pub scale: f32,
    /// Number of noise layers summed per sample.
    pub octaves: u32,
    /// Amplitude multiplier between successive octaves, in [0, 1].
    pub persistence: f32,
    /// Frequency multiplier between successive octaves, at least 1.
    pub lacunarity: f32,
    /// Seed of the per-octave offset stream.
    pub seed: u32,
    /// Global offset added to every sample position.
    pub offset: [f32; 2],
    /// Clamp globally normalized samples to 1.0 as well as 0.0.
    ///
    /// Off by default: globally normalized samples are only clamped below, so a few
    /// peaks may exceed 1.0.
    pub clamp_upper: bool,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            normalize_mode: NormalizeMode::Global,
            scale: 50.0,
            octaves: 6,
            persistence: 0.6,
            lacunarity: 2.0,
            seed: 0,
            offset: [0.0, 0.0],
            clamp_upper: false,
        }
    }
}

impl NoiseSettings {
    /// Clamps every parameter into its valid range.
    pub fn validate(&mut self) {
        self.scale = self.scale.max(0.01);
        self.octaves = self.octaves.max(1);
        self.lacunarity = self.lacunarity.max(1.0);
        self.persistence = self.persistence.clamp(0.0, 1.0);
    }

    /// Returns the name of the first non-finite parameter, if any.
    ///
    /// `validate()` cannot repair these: `f32::max` silently swallows NaN for some
    /// fields and lets it through for others, so they are reported instead.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        [
            ("scale", self.scale),
            ("persistence", self.persistence),
            ("lacunarity", self.lacunarity),
            ("offset.x", self.offset[0]),
            ("offset.y", self.offset[1]),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
        .map(|(name, _)| name)
    }
}

/// A noise layer plus the remapping that turns it into heights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightMapSettings {
    /// Noise parameters of the layer.
    pub noise: NoiseSettings,
    /// Amplitude applied after the curve.
    pub height_multiplier: f32,
    /// Remapping curve evaluated at the normalized noise value.
    pub height_curve: HeightCurve,
    /// Fade the layer out towards the window's edges.
    pub use_falloff: bool,
}

impl Default for HeightMapSettings {
    fn default() -> Self {
        Self {
            noise: NoiseSettings::default(),
            height_multiplier: 20.0,
            height_curve: HeightCurve::linear(),
            use_falloff: false,
        }
    }
}

impl HeightMapSettings {
    /// Lowest height the curve can produce.
    pub fn min_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(0.0)
    }

    /// Highest height the curve can produce for a normalized sample of 1.
    pub fn max_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(1.0)
    }

    /// Clamps the noise parameters and sorts the curve keys.
    pub fn validate(&mut self) {
        self.noise.validate();
        self.height_curve.validate();
    }

    fn first_non_finite(&self) -> Option<&'static str> {
        if !self.height_multiplier.is_finite() {
            return Some("height_multiplier");
        }
        self.noise.first_non_finite()
    }
}

/// Chunk size and shading of generated meshes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    /// World units per sample.
    pub mesh_scale: f32,
    /// Duplicate vertices per triangle so the renderer shades each face flat.
    pub use_flat_shading: bool,
    /// Index into `SUPPORTED_CHUNK_SIZES`.
    pub chunk_size_index: usize,
    /// Index into `SUPPORTED_CHUNK_SIZES` used while flat shading.
    pub flat_shaded_chunk_size_index: usize,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            mesh_scale: 1.0,
            use_flat_shading: false,
            chunk_size_index: 0,
            flat_shaded_chunk_size_index: 0,
        }
    }
}

impl MeshSettings {
    /// The selected chunk size, honouring the flat-shading restriction.
    pub fn chunk_size(&self) -> usize {
        let index = if self.use_flat_shading {
            self.flat_shaded_chunk_size_index
        } else {
            self.chunk_size_index
        };
        SUPPORTED_CHUNK_SIZES[index.min(SUPPORTED_CHUNK_SIZES.len() - 1)]
    }

    /// Vertices per line of a LOD 0 mesh, including the two border rings.
    pub fn num_verts_per_line(&self) -> usize {
        self.chunk_size() + 5
    }

    /// Width of one chunk in world units.
    pub fn mesh_world_size(&self) -> f32 {
        (self.num_verts_per_line() - 3) as f32 * self.mesh_scale
    }

    /// Clamps the size indices and the scale.
    pub fn validate(&mut self) {
        self.chunk_size_index = self.chunk_size_index.min(SUPPORTED_CHUNK_SIZES.len() - 1);
        self.flat_shaded_chunk_size_index = self
            .flat_shaded_chunk_size_index
            .min(NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES - 1);
        if !self.mesh_scale.is_finite() {
            self.mesh_scale = 1.0;
        }
        self.mesh_scale = self.mesh_scale.max(0.01);
    }
}

/// One entry of the distance-to-detail table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodInfo {
    /// Level of detail used inside this band, `0..NUM_SUPPORTED_LODS`.
    pub lod: usize,
    /// Distance from the chunk bounds up to which this band applies.
    pub visible_dst_threshold: f32,
}

impl LodInfo {
    /// Squared `visible_dst_threshold`, compared against squared viewer distances.
    pub fn sqr_visible_dst_threshold(&self) -> f32 {
        self.visible_dst_threshold * self.visible_dst_threshold
    }
}

/// Tree stamping rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeSettings {
    /// Vegetation samples above this turn the surface block into grass.
    pub vegetation_threshold: f32,
    /// Tree-density samples below this, on a grass column, grow a tree.
    pub tree_threshold: f32,
    /// Trees only grow on columns whose world x and z are multiples of this.
    pub spacing: i32,
    /// Blocks between the surface and the first trunk block.
    pub height_offset: i32,
    /// Number of trunk blocks.
    pub trunk_height: i32,
    /// Horizontal reach of the canopy around the trunk.
    pub canopy_radius: i32,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            vegetation_threshold: 0.2,
            tree_threshold: 0.3,
            spacing: 6,
            height_offset: 1,
            trunk_height: 4,
            canopy_radius: 2,
        }
    }
}

/// Cave worm walk parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WormSettings {
    /// Number of steps the worm takes.
    pub steps: u32,
    /// World distance covered per step along each axis.
    pub step_length: f32,
    /// Smallest carve radius.
    pub min_radius: f32,
    /// Largest carve radius.
    pub max_radius: f32,
    /// How far below the surface of the highest column the worm starts.
    pub start_depth: i32,
    /// Noise steering the worm.
    pub noise: NoiseSettings,
}

impl Default for WormSettings {
    fn default() -> Self {
        Self {
            steps: 150,
            step_length: 1.0,
            min_radius: 1.0,
            max_radius: 2.5,
            start_depth: 6,
            noise: NoiseSettings {
                scale: 40.0,
                octaves: 2,
                seed: 7,
                ..NoiseSettings::default()
            },
        }
    }
}

/// Block grid layout and decoration rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelSettings {
    /// Number of block layers in a chunk.
    pub chunk_height: usize,
    /// Layer at which a ground height of zero places the surface.
    pub base_land_level: usize,
    /// Tree rules, applied only when vegetation and tree layers are configured.
    pub trees: TreeSettings,
    /// A chunk whose highest ground sample exceeds this gets a cave worm.
    pub cave_height_threshold: f32,
    /// Cave worm parameters.
    pub worm: WormSettings,
    /// Sub-images per row (and column) of the texture atlas.
    pub atlas_size_in_blocks: u32,
    /// Atlas coordinates per block type and face.
    pub block_textures: BlockTextureTable,
}

impl Default for VoxelSettings {
    fn default() -> Self {
        Self {
            chunk_height: 64,
            base_land_level: 32,
            trees: TreeSettings::default(),
            cave_height_threshold: 14.0,
            worm: WormSettings::default(),
            atlas_size_in_blocks: 16,
            block_textures: BlockTextureTable::default(),
        }
    }
}

impl VoxelSettings {
    /// Clamps the grid layout and worm parameters.
    pub fn validate(&mut self) {
        self.chunk_height = self.chunk_height.max(1);
        self.base_land_level = self.base_land_level.min(self.chunk_height - 1);
        self.atlas_size_in_blocks = self.atlas_size_in_blocks.max(1);
        self.trees.spacing = self.trees.spacing.max(1);
        self.trees.trunk_height = self.trees.trunk_height.max(1);
        self.trees.canopy_radius = self.trees.canopy_radius.max(0);
        self.worm.noise.validate();
        self.worm.min_radius = self.worm.min_radius.max(0.5);
        self.worm.max_radius = self.worm.max_radius.max(self.worm.min_radius);
    }
}

/// Complete configuration of a streamed terrain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    /// Ground height layer.
    pub height_map: HeightMapSettings,
    /// Optional vegetation density layer.
    pub vegetation_map: Option<HeightMapSettings>,
    /// Optional tree density layer.
    pub tree_map: Option<HeightMapSettings>,
    /// Chunk size and shading.
    pub mesh: MeshSettings,
    /// Block grid layout and decorations.
    pub voxel: VoxelSettings,
    /// Distance bands, nearest first. The last threshold is the view distance.
    pub detail_levels: Vec<LodInfo>,
    /// Band whose mesh doubles as the physics collider.
    pub collider_lod_index: usize,
    /// Mesher used for every chunk.
    pub mesh_strategy: MeshStrategy,
    /// Chunks kept resident before hidden ones are evicted.
    pub max_resident_chunks: usize,
    /// Ticks between transfers of the cross-chunk modification table.
    pub modification_drain_interval: u32,
    /// Worker threads; `None` uses the available parallelism.
    pub worker_count: Option<usize>,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            height_map: HeightMapSettings::default(),
            vegetation_map: Some(HeightMapSettings {
                noise: NoiseSettings {
                    scale: 30.0,
                    octaves: 3,
                    seed: 1,
                    ..NoiseSettings::default()
                },
                height_multiplier: 1.0,
                ..HeightMapSettings::default()
            }),
            tree_map: Some(HeightMapSettings {
                noise: NoiseSettings {
                    scale: 8.0,
                    octaves: 2,
                    seed: 2,
                    ..NoiseSettings::default()
                },
                height_multiplier: 1.0,
                ..HeightMapSettings::default()
            }),
            mesh: MeshSettings::default(),
            voxel: VoxelSettings::default(),
            detail_levels: vec![
                LodInfo {
                    lod: 0,
                    visible_dst_threshold: 30.0,
                },
                LodInfo {
                    lod: 1,
                    visible_dst_threshold: 60.0,
                },
                LodInfo {
                    lod: 2,
                    visible_dst_threshold: 90.0,
                },
            ],
            collider_lod_index: 0,
            mesh_strategy: MeshStrategy::Cubical,
            max_resident_chunks: 512,
            modification_drain_interval: 1,
            worker_count: None,
        }
    }
}

impl TerrainSettings {
    /// Parses settings from a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, TerrainError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TerrainError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| TerrainError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Writes the settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TerrainError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| TerrainError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Clamps every section into its valid range.
    ///
    /// Levels of detail that do not evenly divide the chunk size would leave holes in a
    /// continuous mesh, so they are lowered to the nearest level that does.
    pub fn validate(&mut self) {
        self.height_map.validate();
        if let Some(vegetation) = self.vegetation_map.as_mut() {
            vegetation.validate();
        }
        if let Some(trees) = self.tree_map.as_mut() {
            trees.validate();
        }
        self.mesh.validate();
        self.voxel.validate();

        let chunk_size = self.mesh.chunk_size();
        for info in &mut self.detail_levels {
            info.lod = info.lod.min(NUM_SUPPORTED_LODS - 1);
            info.visible_dst_threshold = info.visible_dst_threshold.max(0.0);
            while info.lod > 0 && chunk_size % skip_increment(info.lod) != 0 {
                warn!(
                    "LOD {} does not divide chunk size {}, lowering it",
                    info.lod, chunk_size
                );
                info.lod -= 1;
            }
        }
        self.collider_lod_index = self
            .collider_lod_index
            .min(self.detail_levels.len().saturating_sub(1));
        self.max_resident_chunks = self.max_resident_chunks.max(1);
        self.modification_drain_interval = self.modification_drain_interval.max(1);
    }

    /// Reports the first numeric parameter that is NaN or infinite.
    pub fn check_finite(&self) -> Result<(), TerrainError> {
        let layers = [
            Some(("height_map", &self.height_map)),
            self.vegetation_map.as_ref().map(|layer| ("vegetation_map", layer)),
            self.tree_map.as_ref().map(|layer| ("tree_map", layer)),
        ];
        for (layer, settings) in layers.into_iter().flatten() {
            if let Some(field) = settings.first_non_finite() {
                return Err(TerrainError::NonFiniteNoise(format!("{layer}.{field}")));
            }
        }
        if let Some(field) = self.voxel.worm.noise.first_non_finite() {
            return Err(TerrainError::NonFiniteNoise(format!("voxel.worm.noise.{field}")));
        }
        Ok(())
    }

    /// The farthest distance at which a chunk is visible.
    pub fn max_view_distance(&self) -> f32 {
        self.detail_levels
            .last()
            .map(|info| info.visible_dst_threshold)
            .unwrap_or(0.0)
    }

    /// Width of one chunk in world units.
    pub fn mesh_world_size(&self) -> f32 {
        self.mesh.mesh_world_size()
    }

    /// Side length of the height windows a chunk requests.
    ///
    /// Block grids need one border column on each side of the chunk; continuous meshes need
    /// the full vertex line including both border rings.
    pub fn height_window_size(&self) -> usize {
        match self.mesh_strategy {
            MeshStrategy::Cubical => self.mesh_world_size().round() as usize + 2,
            MeshStrategy::Continuous => self.mesh.num_verts_per_line(),
        }
    }
}

/// Distance in samples between the vertices kept at a level of detail.
pub fn skip_increment(lod: usize) -> usize {
    if lod == 0 {
        1
    } else {
        lod * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_mesh_world_size_follows_chunk_size() {
        let settings = MeshSettings {
            mesh_scale: 2.5,
            chunk_size_index: 1,
            ..MeshSettings::default()
        };
        assert_eq!(settings.num_verts_per_line(), 53);
        assert!((settings.mesh_world_size() - 125.0).abs() < EPSILON);
    }

    #[test]
    fn test_flat_shading_restricts_chunk_size() {
        let mut settings = MeshSettings {
            use_flat_shading: true,
            flat_shaded_chunk_size_index: 9,
            ..MeshSettings::default()
        };
        settings.validate();
        assert_eq!(settings.flat_shaded_chunk_size_index, 2);
        assert_eq!(settings.chunk_size(), 72);
    }

    #[test]
    fn test_noise_validation_clamps_instead_of_rejecting() {
        let mut noise = NoiseSettings {
            scale: -3.0,
            octaves: 0,
            persistence: 1.7,
            lacunarity: 0.2,
            ..NoiseSettings::default()
        };
        noise.validate();
        assert!((noise.scale - 0.01).abs() < EPSILON);
        assert_eq!(noise.octaves, 1);
        assert!((noise.persistence - 1.0).abs() < EPSILON);
        assert!((noise.lacunarity - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_non_finite_parameters_are_reported() {
        let mut settings = TerrainSettings::default();
        settings.height_map.noise.offset[1] = f32::NAN;
        match settings.check_finite() {
            Err(TerrainError::NonFiniteNoise(field)) => {
                assert_eq!(field, "height_map.offset.y")
            }
            other => panic!("expected NonFiniteNoise, got {other:?}"),
        }
    }

    #[test]
    fn test_lod_lowered_until_it_divides_chunk_size() {
        let mut settings = TerrainSettings::default();
        settings.detail_levels = vec![LodInfo {
            lod: 3,
            visible_dst_threshold: 10.0,
        }];
        settings.validate();
        assert_eq!(settings.detail_levels[0].lod, 2, "skip 6 does not divide 16, skip 4 does");
    }

    #[test]
    fn test_min_and_max_height_come_from_the_curve() {
        let settings = HeightMapSettings {
            height_multiplier: 10.0,
            ..HeightMapSettings::default()
        };
        assert!(settings.min_height().abs() < EPSILON);
        assert!((settings.max_height() - 10.0).abs() < EPSILON);
    }

    #[test]
    fn test_json_round_trip_keeps_defaults_for_missing_fields() {
        let settings = TerrainSettings::from_json_str(r#"{ "max_resident_chunks": 64 }"#).unwrap();
        assert_eq!(settings.max_resident_chunks, 64);
        assert_eq!(settings.detail_levels, TerrainSettings::default().detail_levels);

        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(TerrainSettings::from_json_str(&json).unwrap(), settings);
    }

    #[test]
    fn test_height_window_size_depends_on_strategy() {
        let mut settings = TerrainSettings::default();
        settings.mesh_strategy = MeshStrategy::Cubical;
        assert_eq!(settings.height_window_size(), 20);
        settings.mesh_strategy = MeshStrategy::Continuous;
        assert_eq!(settings.height_window_size(), 21);
    }
}
