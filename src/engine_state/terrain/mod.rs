//! # Terrain Heights
//!
//! Everything that produces 2D height data: the multi-octave noise sampler, the keyframe
//! remapping curve, the optional edge falloff, and the builder that combines them into the
//! height layers a chunk consumes.
//!
//! All functions here are pure. The same settings and sample center always yield the same
//! field, which is what allows chunks to be generated independently, in any order, on any
//! worker thread.

pub mod falloff;
pub mod height_curve;
pub mod height_field;
pub mod height_map;
pub mod noise_field;

pub use height_field::HeightField;
pub use height_map::{HeightLayers, HeightMapBuilder};
pub use noise_field::NoiseField;
