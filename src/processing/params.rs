//! Processing parameters and their validation

use std::path::{Path, PathBuf};
use crate::audio::{EncodeOptions, OutputFormat};
use crate::error::{AudioProcError, Result, ValidationError};

pub const SAMPLE_RATE_PRESETS: &[u32] = &[44100, 48000, 96000];
pub const WAV_BIT_DEPTHS: &[u16] = &[16, 24, 32];
pub const MP3_BITRATE_PRESETS: &[u32] = &[128, 192, 256, 320];

pub const DEFAULT_NORMALIZE_TARGET_DB: &str = "-6.0";
pub const DEFAULT_WAV_BIT_DEPTH: u16 = 16;
pub const DEFAULT_MP3_BITRATE_KBPS: u32 = 192;
pub const DEFAULT_FLAC_COMPRESSION_LEVEL: u8 = 5;

/// Format-specific export settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOptions {
    Wav { bit_depth: Option<u16> },
    Mp3 { bitrate_kbps: Option<u32> },
    Flac { compression_level: Option<u8> },
}

impl FormatOptions {
    /// Settings the front end shows when `format` is selected
    pub fn defaults_for(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Wav => FormatOptions::Wav { bit_depth: Some(DEFAULT_WAV_BIT_DEPTH) },
            OutputFormat::Mp3 => FormatOptions::Mp3 { bitrate_kbps: Some(DEFAULT_MP3_BITRATE_KBPS) },
            OutputFormat::Flac => FormatOptions::Flac {
                compression_level: Some(DEFAULT_FLAC_COMPRESSION_LEVEL),
            },
        }
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            FormatOptions::Wav { .. } => OutputFormat::Wav,
            FormatOptions::Mp3 { .. } => OutputFormat::Mp3,
            FormatOptions::Flac { .. } => OutputFormat::Flac,
        }
    }

    /// Encoder parameters; WAV bit depth is applied to the buffer instead.
    pub fn encode_options(&self) -> EncodeOptions {
        match *self {
            FormatOptions::Wav { .. } => EncodeOptions::Wav,
            FormatOptions::Mp3 { bitrate_kbps } => EncodeOptions::Mp3 {
                bitrate_kbps: bitrate_kbps.unwrap_or(DEFAULT_MP3_BITRATE_KBPS),
            },
            FormatOptions::Flac { compression_level } => EncodeOptions::Flac {
                compression_level: compression_level.unwrap_or(DEFAULT_FLAC_COMPRESSION_LEVEL),
            },
        }
    }
}

/// Raw settings collected from the front end for one job
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingParams {
    pub mono: bool,
    pub normalize: bool,
    /// Target peak in dB exactly as typed by the user
    pub normalize_target_db: Option<String>,
    pub sample_rate_hz: Option<u32>,
    pub format: FormatOptions,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            mono: false,
            normalize: false,
            normalize_target_db: Some(DEFAULT_NORMALIZE_TARGET_DB.to_string()),
            sample_rate_hz: None,
            format: FormatOptions::defaults_for(OutputFormat::Wav),
        }
    }
}

/// Settings that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedParams {
    pub mono: bool,
    /// Present only when normalization is enabled; always negative
    pub normalize_target_db: Option<f64>,
    pub sample_rate_hz: Option<u32>,
    pub format: FormatOptions,
}

/// Check user input before any processing starts.
pub fn validate(params: &ProcessingParams) -> std::result::Result<ValidatedParams, ValidationError> {
    let normalize_target_db = match (params.normalize, params.normalize_target_db.as_deref()) {
        (true, Some(raw)) if !raw.trim().is_empty() => Some(parse_target_db(raw)?),
        _ => None,
    };

    Ok(ValidatedParams {
        mono: params.mono,
        normalize_target_db,
        sample_rate_hz: params.sample_rate_hz,
        format: params.format,
    })
}

fn parse_target_db(raw: &str) -> std::result::Result<f64, ValidationError> {
    let value: f64 = raw.trim().parse().map_err(|_| ValidationError::NotANumber)?;
    if !value.is_finite() {
        return Err(ValidationError::NotANumber);
    }
    if value >= 0.0 {
        return Err(ValidationError::MustBeNegative);
    }
    Ok(value)
}

/// Validated settings bound to an output file
#[derive(Debug, Clone, PartialEq)]
pub struct JobParams {
    params: ValidatedParams,
    output_path: PathBuf,
}

impl JobParams {
    pub fn new<P: Into<PathBuf>>(params: ValidatedParams, output_path: P) -> Result<Self> {
        let output_path = output_path.into();
        if output_path.as_os_str().is_empty() {
            return Err(AudioProcError::config("Output path cannot be empty"));
        }
        Ok(Self { params, output_path })
    }

    pub fn params(&self) -> &ValidatedParams {
        &self.params
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn format(&self) -> OutputFormat {
        self.params.format.format()
    }
}

/// `<dir>/<stem>_processed.<ext>` next to the source file
pub fn suggested_output_path(source: &Path, format: OutputFormat) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    let file_name = format!("{}_processed.{}", stem, format.extension());

    match source.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}
