//! Audio Processing Pipeline

pub mod params;
pub mod pipeline;

pub use params::{
    suggested_output_path, validate, FormatOptions, JobParams, ProcessingParams, ValidatedParams,
};
pub use pipeline::{Pipeline, Stage};
