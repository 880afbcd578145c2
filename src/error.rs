//! Error Types

use thiserror::Error;
use crate::processing::Stage;

/// Main error type
#[derive(Debug, Error)]
pub enum AudioProcError {
    #[error("Cannot load audio file: {message}")]
    Load { message: String },

    #[error("No audio file selected")]
    NoFileSelected,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("Codec error: {message}")]
    Codec { message: String },

    #[error("Config error: {message}")]
    Config { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl AudioProcError {
    pub fn load<S: Into<String>>(msg: S) -> Self { Self::Load { message: msg.into() } }
    pub fn codec<S: Into<String>>(msg: S) -> Self { Self::Codec { message: msg.into() } }
    pub fn config<S: Into<String>>(msg: S) -> Self { Self::Config { message: msg.into() } }
    pub fn io<S: Into<String>>(msg: S) -> Self { Self::Io { message: msg.into() } }
}

impl From<std::io::Error> for AudioProcError {
    fn from(err: std::io::Error) -> Self { Self::io(err.to_string()) }
}

/// Rejected normalization target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Normalization target must be a number")]
    NotANumber,
    #[error("Normalization target must be negative")]
    MustBeNegative,
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Processing failed in {stage} stage: {cause}")]
    StageFailure {
        stage: Stage,
        #[source]
        cause: Box<AudioProcError>,
    },

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
}

impl ProcessingError {
    pub fn stage(stage: Stage, cause: AudioProcError) -> Self {
        Self::StageFailure { stage, cause: Box::new(cause) }
    }
}

pub type Result<T> = std::result::Result<T, AudioProcError>;
