//! # Errors
//!
//! The crate-wide error type. Generation itself never fails: malformed numeric settings are
//! clamped during validation and out-of-range voxel reads are treated as air. The variants
//! here cover the few structural problems that cannot be corrected silently.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the terrain pipeline.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// The noise configuration produces NaN or infinite samples.
    ///
    /// Detected once when the chunk manager is created, never per sample.
    #[error("noise settings produce non-finite samples: {0}")]
    NonFiniteNoise(String),

    /// Reading or writing a settings or edit-log file failed.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// The file that could not be accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A settings or edit-log document could not be parsed.
    #[error("failed to parse terrain document: {0}")]
    Parse(#[from] serde_json::Error),

    /// No levels of detail were configured, so no chunk could ever become visible.
    #[error("at least one level of detail must be configured")]
    NoDetailLevels,

    /// A mesh generator was handed input it cannot mesh.
    #[error("mesh generator `{generator}` cannot mesh a {source_kind}")]
    MeshSourceMismatch {
        /// Name of the generator that rejected the input.
        generator: &'static str,
        /// The kind of input it received.
        source_kind: &'static str,
    },

    /// A worker thread exited while tasks were still assigned to it.
    #[error("a terrain worker thread disconnected with tasks in flight")]
    WorkerDisconnected,
}
