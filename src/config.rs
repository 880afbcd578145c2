//! Configuration management for audio processing

use crate::audio::encoder::{MAX_FLAC_COMPRESSION_LEVEL, MP3_BITRATES_KBPS};
use crate::audio::{NativeBackend, OutputFormat};
use crate::error::{AudioProcError, Result};
use crate::processing::params::{
    FormatOptions, ProcessingParams, DEFAULT_FLAC_COMPRESSION_LEVEL, DEFAULT_MP3_BITRATE_KBPS,
    DEFAULT_NORMALIZE_TARGET_DB, DEFAULT_WAV_BIT_DEPTH, MP3_BITRATE_PRESETS, SAMPLE_RATE_PRESETS,
    WAV_BIT_DEPTHS,
};
use clap::Parser;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MAX_SAMPLE_RATE_HZ: u32 = 384_000;
pub const SUPPORTED_BIT_DEPTHS: &[u16] = &[8, 16, 24, 32];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub verbose: bool,
    pub processing: ProcessingConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub mono: bool,
    pub normalize: bool,
    pub normalize_target_db: String,
    /// Absent means keep the source rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate_hz: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub format: OutputFormat,
    pub wav_bit_depth: u16,
    pub mp3_bitrate_kbps: u32,
    pub flac_compression_level: u8,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            mono: false,
            normalize: false,
            normalize_target_db: DEFAULT_NORMALIZE_TARGET_DB.to_string(),
            sample_rate_hz: None,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Wav,
            wav_bit_depth: DEFAULT_WAV_BIT_DEPTH,
            mp3_bitrate_kbps: DEFAULT_MP3_BITRATE_KBPS,
            flac_compression_level: DEFAULT_FLAC_COMPRESSION_LEVEL,
        }
    }
}

impl Config {
    pub fn format(&self) -> OutputFormat {
        self.export.format
    }

    /// Front-end state for one job, built from this configuration
    pub fn to_processing_params(&self) -> ProcessingParams {
        let format = match self.export.format {
            OutputFormat::Wav => FormatOptions::Wav { bit_depth: Some(self.export.wav_bit_depth) },
            OutputFormat::Mp3 => FormatOptions::Mp3 { bitrate_kbps: Some(self.export.mp3_bitrate_kbps) },
            OutputFormat::Flac => FormatOptions::Flac {
                compression_level: Some(self.export.flac_compression_level),
            },
        };

        ProcessingParams {
            mono: self.processing.mono,
            normalize: self.processing.normalize,
            normalize_target_db: Some(self.processing.normalize_target_db.clone()),
            sample_rate_hz: self.processing.sample_rate_hz,
            format,
        }
    }

    pub fn backend(&self) -> NativeBackend {
        NativeBackend::new()
    }

    /// Settings that are valid but not among the choices the front end offers
    pub fn off_preset_settings(&self) -> Vec<String> {
        let mut notes = Vec::new();

        if let Some(rate) = self.processing.sample_rate_hz {
            if !SAMPLE_RATE_PRESETS.contains(&rate) {
                notes.push(format!("sample rate {} Hz is not one of {:?}", rate, SAMPLE_RATE_PRESETS));
            }
        }

        match self.export.format {
            OutputFormat::Wav if !WAV_BIT_DEPTHS.contains(&self.export.wav_bit_depth) => {
                notes.push(format!(
                    "WAV bit depth {} is not one of {:?}", self.export.wav_bit_depth, WAV_BIT_DEPTHS
                ));
            }
            OutputFormat::Mp3 if !MP3_BITRATE_PRESETS.contains(&self.export.mp3_bitrate_kbps) => {
                notes.push(format!(
                    "MP3 bitrate {} kbps is not one of {:?}", self.export.mp3_bitrate_kbps, MP3_BITRATE_PRESETS
                ));
            }
            _ => {}
        }

        notes
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "audioproc", about = "Audio file processor: mono, normalize, resample, convert", version)]
pub struct Args {
    #[arg(short = 'i', long = "input", help = "Input audio file (wav, mp3, flac, aac, m4a, ogg)")]
    pub input: Option<PathBuf>,

    #[arg(short = 'o', long = "output", help = "Output file path [default: <input>_processed.<format>]")]
    pub output: Option<PathBuf>,

    #[arg(short = 'f', long = "format", help = "Output format: wav, mp3 or flac")]
    pub format: Option<OutputFormat>,

    #[arg(long = "mono", help = "Downmix to a single channel")]
    pub mono: bool,

    #[arg(
        short = 'n',
        long = "normalize",
        value_name = "DB",
        allow_hyphen_values = true,
        help = "Normalize the peak to this level in dBFS (must be negative)"
    )]
    pub normalize: Option<String>,

    #[arg(short = 'r', long = "sample-rate", help = "Output sample rate (Hz)")]
    pub sample_rate: Option<u32>,

    #[arg(long = "keep-sample-rate", conflicts_with = "sample_rate", help = "Keep the source sample rate")]
    pub keep_sample_rate: bool,

    #[arg(long = "bit-depth", help = "WAV bit depth (8, 16, 24, 32)")]
    pub bit_depth: Option<u16>,

    #[arg(long = "bitrate", help = "MP3 bitrate (kbps)")]
    pub bitrate: Option<u32>,

    #[arg(long = "compression", help = "FLAC compression level (0-8)")]
    pub compression: Option<u8>,

    #[arg(short = 'c', long = "config", help = "Config file path (TOML format)")]
    pub config_file: Option<PathBuf>,

    #[arg(long = "info-only", help = "Print file information and exit")]
    pub info_only: bool,

    #[arg(long = "write-default-config", value_name = "PATH", help = "Write the default config file and exit")]
    pub write_default_config: Option<PathBuf>,

    #[arg(short = 'v', long = "verbose", help = "Enable verbose output mode")]
    pub verbose: bool,
}

impl Config {
    /// Load the config file (if given), then apply command line overrides
    pub fn from_args_and_config(args: &Args) -> Result<Self> {
        let mut config = if let Some(config_path) = &args.config_file {
            Self::from_file(config_path)?
        } else {
            Self::default()
        };

        if let Some(format) = args.format {
            config.export.format = format;
        }
        if args.mono {
            config.processing.mono = true;
        }
        if let Some(target) = &args.normalize {
            config.processing.normalize = true;
            config.processing.normalize_target_db = target.clone();
        }
        if args.keep_sample_rate {
            config.processing.sample_rate_hz = None;
        } else if let Some(rate) = args.sample_rate {
            config.processing.sample_rate_hz = Some(rate);
        }
        if let Some(bits) = args.bit_depth {
            config.export.wav_bit_depth = bits;
        }
        if let Some(bitrate) = args.bitrate {
            config.export.mp3_bitrate_kbps = bitrate;
        }
        if let Some(level) = args.compression {
            config.export.flac_compression_level = level;
        }
        config.verbose |= args.verbose;

        config.validate()?;
        for note in config.off_preset_settings() {
            warn!("Unusual setting: {}", note);
        }

        Ok(config)
    }

    /// Load config from TOML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AudioProcError::config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| AudioProcError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Check ranges; the normalization target is checked per job instead.
    pub fn validate(&self) -> Result<()> {
        if let Some(rate) = self.processing.sample_rate_hz {
            if rate == 0 {
                return Err(AudioProcError::config("Sample rate must be greater than 0"));
            }
            if rate > MAX_SAMPLE_RATE_HZ {
                return Err(AudioProcError::config(format!(
                    "Sample rate cannot exceed {} Hz", MAX_SAMPLE_RATE_HZ
                )));
            }
        }

        if !SUPPORTED_BIT_DEPTHS.contains(&self.export.wav_bit_depth) {
            return Err(AudioProcError::config(format!(
                "WAV bit depth must be one of {:?}", SUPPORTED_BIT_DEPTHS
            )));
        }

        if !MP3_BITRATES_KBPS.contains(&self.export.mp3_bitrate_kbps) {
            return Err(AudioProcError::config(format!(
                "MP3 bitrate must be one of {:?} kbps", MP3_BITRATES_KBPS
            )));
        }

        if self.export.flac_compression_level > MAX_FLAC_COMPRESSION_LEVEL {
            return Err(AudioProcError::config(format!(
                "FLAC compression level must be in range [0, {}]", MAX_FLAC_COMPRESSION_LEVEL
            )));
        }

        Ok(())
    }

    /// Save config to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AudioProcError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| AudioProcError::config(format!("Failed to write config file: {}", e)))
    }

    /// Create default config file
    pub fn create_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        Self::default().save_to_file(path)
    }
}
