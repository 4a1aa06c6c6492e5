//! # Core Module
//!
//! Concurrency primitives shared by the terrain pipeline.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking, used for
//!   the cross-chunk modification table that both the main loop and edit producers touch.

pub mod mt_resource;

pub use mt_resource::MtResource;
