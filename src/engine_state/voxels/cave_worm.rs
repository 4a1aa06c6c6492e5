//! # Cave Worm
//!
//! A noise-steered random walk that carves tunnels. The walker keeps two positions: its
//! head in world space and a cursor in an abstract noise space that drifts at a fixed
//! rate. Each step samples the noise at the cursor, turns the samples into a direction and
//! moves the head. Whenever the head enters a new cell a sphere is carved around it, with
//! a radius that follows a third, wrapped noise sample so the tunnel's girth varies.

use std::collections::HashSet;
use std::f64::consts::PI;

use cgmath::{Point3, Vector2, Vector3};

use crate::engine_state::settings::WormSettings;
use crate::engine_state::terrain::NoiseField;

use super::coords::cell_of_position;

/// Walks a worm through `noise` and collects the cells it clears.
pub struct CaveWorm<'a> {
    noise: &'a NoiseField,
    settings: &'a WormSettings,
}

impl<'a> CaveWorm<'a> {
    /// Creates a worm steered by `noise`.
    pub fn new(noise: &'a NoiseField, settings: &'a WormSettings) -> Self {
        Self { noise, settings }
    }

    /// Runs the walk from world position `start`.
    ///
    /// # Returns
    /// Each carved cell once, in the order it was first carved. Cells below y = 0 are
    /// skipped.
    pub fn carve(&self, start: Vector3<f32>) -> Vec<Point3<i32>> {
        let step_length = self.settings.step_length as f64;
        let mut head = start.cast::<f64>().unwrap_or(Vector3::new(0.0, 0.0, 0.0));
        let mut noise_pos = head;
        let mut last_cell = cell_of_position(start);

        let mut seen = HashSet::new();
        let mut carved = Vec::new();

        for _ in 0..self.settings.steps {
            let n1 = self.noise.sample_point(Vector2::new(noise_pos.x, noise_pos.y)) as f64;
            let n2 = self.noise.sample_point(Vector2::new(-noise_pos.x / 2.0, noise_pos.z)) as f64;
            let direction = Vector3::new(
                (n1 * PI).cos(),
                (n1 * 1.5 * PI).sin(),
                (n2 * PI).sin(),
            );
            head -= direction * step_length;

            noise_pos.x -= 2.0 * step_length;
            noise_pos.y += step_length / 6.0;
            noise_pos.z -= step_length / 6.0;

            let cell = cell_of_position(Vector3::new(head.x as f32, head.y as f32, head.z as f32));
            if cell == last_cell {
                continue;
            }
            last_cell = cell;

            let radius = self.radius_at(noise_pos);
            for offset in sphere_offsets(radius) {
                let target = cell + offset;
                if target.y >= 0 && seen.insert(target) {
                    carved.push(target);
                }
            }
        }
        carved
    }

    fn radius_at(&self, noise_pos: Vector3<f64>) -> f32 {
        let n3 = self.noise.sample_point(Vector2::new(noise_pos.z, noise_pos.x));
        let wrapped = (n3 * 4.0).rem_euclid(1.0);
        let min = self.settings.min_radius;
        min + (self.settings.max_radius - min) * wrapped
    }
}

fn sphere_offsets(radius: f32) -> Vec<Vector3<i32>> {
    let reach = radius.ceil() as i32;
    let sqr_radius = radius * radius;
    let mut offsets = Vec::new();
    for dy in -reach..=reach {
        for dz in -reach..=reach {
            for dx in -reach..=reach {
                if (dx * dx + dy * dy + dz * dz) as f32 <= sqr_radius {
                    offsets.push(Vector3::new(dx, dy, dz));
                }
            }
        }
    }
    offsets
}
