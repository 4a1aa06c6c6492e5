//! # Height Map Builder
//!
//! Turns normalized noise windows into terrain heights:
//! `height = noise * curve(noise) * height_multiplier`.

use cgmath::Vector2;

use crate::engine_state::settings::{HeightMapSettings, TerrainSettings};

use super::falloff::apply_falloff;
use super::height_curve::HeightCurve;
use super::height_field::HeightField;
use super::noise_field::NoiseField;

/// Builds height fields from noise.
pub struct HeightMapBuilder;

impl HeightMapBuilder {
    /// Remaps every sample of `raw` through `curve` and scales it.
    ///
    /// # Arguments
    /// * `raw` - Normalized noise
    /// * `curve` - Remapping curve evaluated at each raw sample
    /// * `height_multiplier` - Amplitude applied after the curve
    ///
    /// # Returns
    /// A new field with recomputed extremes.
    pub fn build(raw: &HeightField, curve: &HeightCurve, height_multiplier: f32) -> HeightField {
        raw.map(|_, _, value| value * curve.evaluate(value) * height_multiplier)
    }

    /// Samples noise for a window and builds the heights in one go.
    ///
    /// # Arguments
    /// * `width`, `height` - Window size in samples
    /// * `settings` - Noise, curve and falloff configuration of the layer
    /// * `sample_center` - Center of the window in sample space
    pub fn generate(
        width: usize,
        height: usize,
        settings: &HeightMapSettings,
        sample_center: Vector2<f32>,
    ) -> HeightField {
        let mut raw = NoiseField::new(&settings.noise).sample(width, height, sample_center);
        if settings.use_falloff {
            raw = apply_falloff(&raw);
        }
        Self::build(&raw, &settings.height_curve, settings.height_multiplier)
    }
}

/// The height layers a chunk needs before it can build blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightLayers {
    /// Ground height above the base land level.
    pub ground: HeightField,
    /// Vegetation density, when configured.
    pub vegetation: Option<HeightField>,
    /// Tree density, when configured.
    pub trees: Option<HeightField>,
}

impl HeightLayers {
    /// Generates every configured layer for a square window of `size` samples.
    pub fn generate(settings: &TerrainSettings, size: usize, sample_center: Vector2<f32>) -> Self {
        let layer = |layer: &HeightMapSettings| {
            HeightMapBuilder::generate(size, size, layer, sample_center)
        };
        Self {
            ground: layer(&settings.height_map),
            vegetation: settings.vegetation_map.as_ref().map(layer),
            trees: settings.tree_map.as_ref().map(layer),
        }
    }

    /// Ground heights only, with no decoration layers.
    pub fn ground_only(ground: HeightField) -> Self {
        Self {
            ground,
            vegetation: None,
            trees: None,
        }
    }
}
