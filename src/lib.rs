//! audioproc - Single-file audio processing library
//!
//! Loads one audio file, then runs a fixed pipeline on a background worker:
//! mono downmix, peak normalization, resampling and export to WAV, MP3 or FLAC.

pub mod audio;
pub mod config;
pub mod error;
pub mod job;
pub mod processing;

pub use audio::{AudioBackend, AudioInfo, LoadedAudio, NativeBackend, OutputFormat};
pub use config::{Args, Config};
pub use error::{AudioProcError, ProcessingError, Result, ValidationError};
pub use job::{Frontend, JobRunner, SubmitOutcome};
pub use processing::{FormatOptions, ProcessingParams, Stage};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// `RUST_LOG` wins over the verbose flag when set.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init()
        .ok();
}

pub fn get_library_info() -> LibraryInfo {
    LibraryInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl std::fmt::Display for LibraryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{} - {}", self.name, self.version, self.description)
    }
}
