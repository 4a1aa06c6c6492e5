//! # Voxel Terrain Entry Point
//!
//! Runs the headless streaming walk from the library's `run()` function.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [settings.json] [ticks]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_TICKS: u32 = 300;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let settings_path = args.next().map(PathBuf::from);
    let ticks = args
        .next()
        .and_then(|ticks| ticks.parse().ok())
        .unwrap_or(DEFAULT_TICKS);

    match voxel_terrain::run(settings_path.as_deref(), ticks) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("voxel-terrain: {err}");
            ExitCode::FAILURE
        }
    }
}
