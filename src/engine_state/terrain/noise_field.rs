//! # Noise Field
//!
//! Deterministic multi-octave Perlin sampling of rectangular windows.
//!
//! Every octave is shifted by an offset drawn from a stream seeded with
//! `NoiseSettings::seed`, then by the global offset and the window's sample center. Two
//! windows whose centers differ by `d` therefore read the same underlying field shifted
//! by `d`, which is what lets independently generated chunks line up. The y axis is
//! flipped (offsets and centers are subtracted) so that window rows run towards
//! decreasing world z.

use cgmath::Vector2;
use noise::{NoiseFn, Perlin};

use crate::engine_state::settings::{NoiseSettings, NormalizeMode};
use crate::error::TerrainError;

use super::height_field::HeightField;

/// Range of the per-octave random offsets.
const OCTAVE_OFFSET_RANGE: i32 = 100_000;

/// Fraction of the theoretical maximum amplitude treated as the practical maximum.
const GLOBAL_NORMALIZATION_FACTOR: f64 = 0.9;

/// Scales at or below zero are replaced by this.
const MIN_SCALE: f64 = 0.0001;

/// A configured noise source. Sampling never mutates it.
pub struct NoiseField {
    perlin: Perlin,
    settings: NoiseSettings,
    scale: f64,
    seeded_offsets: Vec<Vector2<f64>>,
    point_offsets: Vec<Vector2<f64>>,
    max_possible_height: f64,
}

impl NoiseField {
    /// Prepares a sampler for `settings`.
    ///
    /// The per-octave offsets are drawn here, once, from a stream seeded with
    /// `settings.seed`.
    pub fn new(settings: &NoiseSettings) -> Self {
        let octaves = settings.octaves.max(1);
        let persistence = settings.persistence as f64;

        let mut rng = fastrand::Rng::with_seed(settings.seed as u64);
        let mut seeded_offsets = Vec::with_capacity(octaves as usize);
        let mut max_possible_height = 0.0;
        let mut amplitude = 1.0;
        for _ in 0..octaves {
            let x = rng.i32(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE) as f64;
            let y = rng.i32(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE) as f64;
            seeded_offsets.push(Vector2::new(x, y));
            max_possible_height += amplitude;
            amplitude *= persistence;
        }

        let scale = if settings.scale as f64 <= 0.0 {
            MIN_SCALE
        } else {
            settings.scale as f64
        };

        let point_offsets =
            shift_offsets(&seeded_offsets, settings.offset, Vector2::new(0.0, 0.0));
        Self {
            perlin: Perlin::new(settings.seed),
            settings: settings.clone(),
            scale,
            seeded_offsets,
            point_offsets,
            max_possible_height,
        }
    }

    /// The settings this field was built from.
    pub fn settings(&self) -> &NoiseSettings {
        &self.settings
    }

    /// Samples a `width` x `height` window centered on `sample_center`.
    ///
    /// Values are normalized according to `NoiseSettings::normalize_mode`. Identical
    /// arguments always produce bit-identical fields.
    pub fn sample(&self, width: usize, height: usize, sample_center: Vector2<f32>) -> HeightField {
        let octave_offsets = self.octave_offsets(sample_center);
        let half_width = width as f64 / 2.0;
        let half_height = height as f64 / 2.0;

        let mut values = Vec::with_capacity(width * height);
        let mut min_local = f64::MAX;
        let mut max_local = f64::MIN;

        for y in 0..height {
            for x in 0..width {
                let noise_height = self.accumulate(
                    x as f64 - half_width,
                    y as f64 - half_height,
                    &octave_offsets,
                );
                min_local = min_local.min(noise_height);
                max_local = max_local.max(noise_height);

                let value = match self.settings.normalize_mode {
                    NormalizeMode::Local => noise_height,
                    NormalizeMode::Global => self.normalize_global(noise_height),
                };
                values.push(value);
            }
        }

        let values = match self.settings.normalize_mode {
            NormalizeMode::Local => values
                .into_iter()
                .map(|v| inverse_lerp(min_local, max_local, v) as f32)
                .collect(),
            NormalizeMode::Global => values.into_iter().map(|v| v as f32).collect(),
        };

        HeightField::from_values(width, height, values)
    }

    /// Samples the raw octave sum at a single point, divided by the maximum amplitude.
    ///
    /// The result lies roughly in [-1, 1]. Used to steer walkers that move through an
    /// abstract noise space rather than across a window.
    pub fn sample_point(&self, point: Vector2<f64>) -> f32 {
        let sum = self.accumulate(point.x, point.y, &self.point_offsets);
        (sum / self.max_possible_height) as f32
    }

    /// Fails if these settings produce NaN or infinite samples.
    ///
    /// Meant to be called once at startup so that bad settings surface as a single
    /// configuration error instead of corrupting every chunk.
    pub fn ensure_finite(&self) -> Result<(), TerrainError> {
        if let Some(field) = self.settings.first_non_finite() {
            return Err(TerrainError::NonFiniteNoise(format!("{field} is not finite")));
        }
        let window = self.sample(3, 3, Vector2::new(0.0, 0.0));
        if let Some(bad) = window.values().iter().find(|v| !v.is_finite()) {
            return Err(TerrainError::NonFiniteNoise(format!(
                "window sample evaluated to {bad}"
            )));
        }
        let point = self.sample_point(Vector2::new(0.5, 0.5));
        if !point.is_finite() {
            return Err(TerrainError::NonFiniteNoise(format!(
                "point sample evaluated to {point}"
            )));
        }
        Ok(())
    }

    fn octave_offsets(&self, sample_center: Vector2<f32>) -> Vec<Vector2<f64>> {
        shift_offsets(&self.seeded_offsets, self.settings.offset, sample_center)
    }

    fn accumulate(&self, x: f64, y: f64, octave_offsets: &[Vector2<f64>]) -> f64 {
        let persistence = self.settings.persistence as f64;
        let lacunarity = self.settings.lacunarity as f64;

        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut noise_height = 0.0;
        for octave_offset in octave_offsets {
            let sample_x = (x + octave_offset.x) / self.scale * frequency;
            let sample_y = (y + octave_offset.y) / self.scale * frequency;
            noise_height += self.perlin.get([sample_x, sample_y]) * amplitude;

            amplitude *= persistence;
            frequency *= lacunarity;
        }
        noise_height
    }

    fn normalize_global(&self, noise_height: f64) -> f64 {
        let normalized =
            (noise_height + 1.0) / (self.max_possible_height / GLOBAL_NORMALIZATION_FACTOR);
        if self.settings.clamp_upper {
            normalized.clamp(0.0, 1.0)
        } else {
            normalized.max(0.0)
        }
    }
}

/// Moves every seeded octave offset by the global offset and the window center.
fn shift_offsets(
    seeded_offsets: &[Vector2<f64>],
    offset: [f32; 2],
    sample_center: Vector2<f32>,
) -> Vec<Vector2<f64>> {
    seeded_offsets
        .iter()
        .map(|seeded| {
            Vector2::new(
                seeded.x + offset[0] as f64 + sample_center.x as f64,
                seeded.y - offset[1] as f64 - sample_center.y as f64,
            )
        })
        .collect()
}

fn inverse_lerp(a: f64, b: f64, value: f64) -> f64 {
    if a == b {
        0.0
    } else {
        ((value - a) / (b - a)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn global_settings() -> NoiseSettings {
        NoiseSettings {
            seed: 42,
            ..NoiseSettings::default()
        }
    }

    #[test]
    fn test_identical_arguments_give_bit_identical_fields() {
        let settings = global_settings();
        let center = Vector2::new(37.0, -12.0);
        let a = NoiseField::new(&settings).sample(16, 16, center);
        let b = NoiseField::new(&settings).sample(16, 16, center);
        let a_bits: Vec<u32> = a.values().iter().map(|v| v.to_bits()).collect();
        let b_bits: Vec<u32> = b.values().iter().map(|v| v.to_bits()).collect();
        assert_eq!(a_bits, b_bits, "sampling must be pure");
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = NoiseField::new(&NoiseSettings { seed: 1, ..global_settings() })
            .sample(8, 8, Vector2::new(0.0, 0.0));
        let b = NoiseField::new(&NoiseSettings { seed: 2, ..global_settings() })
            .sample(8, 8, Vector2::new(0.0, 0.0));
        assert_ne!(a.values(), b.values());
    }

    /// Columns `shift..width` of the left window must equal columns `0..width - shift`
    /// of the right window when the centers are `shift` apart along x.
    #[test]
    fn test_global_windows_tile_along_x() {
        let field = NoiseField::new(&global_settings());
        let size = 16;
        let shift = 13;
        let left = field.sample(size, size, Vector2::new(0.0, 0.0));
        let right = field.sample(size, size, Vector2::new(shift as f32, 0.0));

        for y in 0..size as i32 {
            for x in 0..(size - shift) as i32 {
                let a = left.get(x + shift as i32, y).unwrap();
                let b = right.get(x, y).unwrap();
                assert!(
                    (a - b).abs() < EPSILON,
                    "seam mismatch at ({x}, {y}): {a} vs {b}"
                );
            }
        }
    }

    /// Moving the center up in y moves rows the other way, since the y axis is flipped.
    #[test]
    fn test_global_windows_tile_along_y() {
        let field = NoiseField::new(&global_settings());
        let size = 16;
        let shift = 13;
        let lower = field.sample(size, size, Vector2::new(0.0, 0.0));
        let upper = field.sample(size, size, Vector2::new(0.0, shift as f32));

        for y in 0..(size - shift) as i32 {
            for x in 0..size as i32 {
                let a = lower.get(x, y).unwrap();
                let b = upper.get(x, y + shift as i32).unwrap();
                assert!(
                    (a - b).abs() < EPSILON,
                    "seam mismatch at ({x}, {y}): {a} vs {b}"
                );
            }
        }
    }

    #[test]
    fn test_single_octave_chunks_one_width_apart_share_their_edge() {
        let settings = NoiseSettings {
            octaves: 1,
            persistence: 0.6,
            scale: 50.0,
            seed: 42,
            ..NoiseSettings::default()
        };
        let field = NoiseField::new(&settings);
        let width = 16;
        let a = field.sample(width, width, Vector2::new(0.0, 0.0));
        let b = field.sample(width, width, Vector2::new((width - 1) as f32, 0.0));

        for y in 0..width as i32 {
            let edge_a = a.get(width as i32 - 1, y).unwrap();
            let edge_b = b.get(0, y).unwrap();
            assert!(
                (edge_a - edge_b).abs() < EPSILON,
                "row {y} jumps across the seam: {edge_a} vs {edge_b}"
            );
        }
    }

    #[test]
    fn test_local_windows_do_not_tile() {
        let settings = NoiseSettings {
            normalize_mode: NormalizeMode::Local,
            ..global_settings()
        };
        let field = NoiseField::new(&settings);
        let left = field.sample(16, 16, Vector2::new(0.0, 0.0));
        let right = field.sample(16, 16, Vector2::new(8.0, 0.0));

        let worst = (0..16)
            .flat_map(|y| (0..8).map(move |x| (x, y)))
            .map(|(x, y)| (left.get(x + 8, y).unwrap() - right.get(x, y).unwrap()).abs())
            .fold(0.0f32, f32::max);
        assert!(worst > 1e-3, "independent local normalization should leave a seam");
    }

    #[test]
    fn test_local_mode_spans_unit_range() {
        let settings = NoiseSettings {
            normalize_mode: NormalizeMode::Local,
            ..global_settings()
        };
        let window = NoiseField::new(&settings).sample(24, 24, Vector2::new(5.0, 5.0));
        assert!(window.min_value().abs() < EPSILON);
        assert!((window.max_value() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_global_mode_clamps_only_below_by_default() {
        let field = NoiseField::new(&global_settings());
        let window = field.sample(32, 32, Vector2::new(100.0, 100.0));
        assert!(window.min_value() >= 0.0);

        let clamped = NoiseField::new(&NoiseSettings {
            clamp_upper: true,
            ..global_settings()
        })
        .sample(32, 32, Vector2::new(100.0, 100.0));
        assert!(clamped.max_value() <= 1.0);
    }

    #[test]
    fn test_non_positive_scale_stays_finite() {
        let settings = NoiseSettings {
            scale: 0.0,
            ..global_settings()
        };
        let field = NoiseField::new(&settings);
        assert!(field.ensure_finite().is_ok());
    }

    #[test]
    fn test_non_finite_offset_is_detected() {
        let settings = NoiseSettings {
            offset: [f32::INFINITY, 0.0],
            ..global_settings()
        };
        assert!(matches!(
            NoiseField::new(&settings).ensure_finite(),
            Err(TerrainError::NonFiniteNoise(_))
        ));
    }

    #[test]
    fn test_point_samples_stay_in_unit_range() {
        let field = NoiseField::new(&global_settings());
        for i in 0..64 {
            let v = field.sample_point(Vector2::new(i as f64 * 3.7, i as f64 * -1.3));
            assert!((-1.0..=1.0).contains(&v), "point sample {v} outside [-1, 1]");
        }
    }

    #[test]
    fn test_point_samples_follow_the_global_offset() {
        let plain = NoiseField::new(&global_settings());
        let shifted = NoiseField::new(&NoiseSettings {
            offset: [5.0, 0.0],
            ..global_settings()
        });
        for i in 0..16 {
            let point = Vector2::new(i as f64 * 1.7, i as f64 * 0.9);
            let moved = Vector2::new(point.x + 5.0, point.y);
            let a = shifted.sample_point(point);
            let b = plain.sample_point(moved);
            assert!((a - b).abs() < EPSILON, "offset ignored at {point:?}: {a} vs {b}");
        }
    }
}
