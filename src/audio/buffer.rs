//! In-memory PCM buffer and its summary record

use std::fmt;
use std::path::{Path, PathBuf};
use ndarray::{Array2, ArrayView2};
use crate::error::{AudioProcError, Result};

/// Largest supported sample width in bytes
pub const MAX_SAMPLE_WIDTH: u16 = 4;

/// Convert a linear amplitude (full scale = 1.0) to dBFS.
pub fn amplitude_to_dbfs(amplitude: f32) -> f64 {
    if amplitude <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * (amplitude as f64).log10()
    }
}

/// Linear factor for a gain change in dB.
pub fn db_to_gain(db: f64) -> f32 {
    10f64.powf(db / 20.0) as f32
}

/// Format-level properties of a buffer
#[derive(Debug, Clone, PartialEq)]
pub struct AudioHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_width: u16,
    pub total_frames: usize,
    pub duration: f64,
}

impl AudioHeader {
    pub fn new(sample_rate: u32, channels: u16, sample_width: u16, total_frames: usize) -> Self {
        let duration = if sample_rate > 0 {
            total_frames as f64 / sample_rate as f64
        } else {
            0.0
        };

        Self {
            sample_rate,
            channels,
            sample_width,
            total_frames,
            duration,
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width * 8
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AudioProcError::load("Sample rate cannot be 0"));
        }

        if self.channels == 0 {
            return Err(AudioProcError::load("Channel count cannot be 0"));
        }

        if self.sample_width == 0 || self.sample_width > MAX_SAMPLE_WIDTH {
            return Err(AudioProcError::load(format!(
                "Unsupported sample width: {} bytes", self.sample_width
            )));
        }

        Ok(())
    }
}

/// A decoded audio file.
///
/// Samples are stored as a `frames x channels` matrix of `f32` in the
/// range [-1.0, 1.0]. Values are never mutated in place: every
/// transformation builds a new `LoadedAudio` through [`LoadedAudio::derive`],
/// which carries the source path and original format across unchanged.
#[derive(Debug, Clone)]
pub struct LoadedAudio {
    header: AudioHeader,
    samples: Array2<f32>,
    peak_dbfs: f64,
    original_format: String,
    source_path: PathBuf,
}

impl LoadedAudio {
    pub fn new<P: Into<PathBuf>>(
        samples: Array2<f32>,
        sample_rate: u32,
        sample_width: u16,
        source_path: P,
    ) -> Result<Self> {
        let source_path = source_path.into();
        let original_format = format_from_path(&source_path);
        let header = AudioHeader::new(sample_rate, samples.ncols() as u16, sample_width, samples.nrows());
        header.validate()?;

        Ok(Self {
            peak_dbfs: peak_dbfs_of(samples.view()),
            header,
            samples,
            original_format,
            source_path,
        })
    }

    /// Build a new value from transformed samples, keeping the source identity.
    pub fn derive(&self, samples: Array2<f32>, sample_rate: u32, sample_width: u16) -> Self {
        let header = AudioHeader::new(sample_rate, samples.ncols() as u16, sample_width, samples.nrows());

        Self {
            peak_dbfs: peak_dbfs_of(samples.view()),
            header,
            samples,
            original_format: self.original_format.clone(),
            source_path: self.source_path.clone(),
        }
    }

    pub fn header(&self) -> &AudioHeader {
        &self.header
    }

    pub fn samples(&self) -> ArrayView2<'_, f32> {
        self.samples.view()
    }

    pub fn channels(&self) -> u16 {
        self.header.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.header.sample_rate
    }

    pub fn sample_width(&self) -> u16 {
        self.header.sample_width
    }

    pub fn bit_depth(&self) -> u16 {
        self.header.bits_per_sample()
    }

    pub fn frames(&self) -> usize {
        self.header.total_frames
    }

    pub fn duration(&self) -> f64 {
        self.header.duration
    }

    pub fn peak_dbfs(&self) -> f64 {
        self.peak_dbfs
    }

    pub fn original_format(&self) -> &str {
        &self.original_format
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn info(&self) -> AudioInfo {
        AudioInfo {
            channel_count: self.channels(),
            sample_rate_hz: self.sample_rate(),
            bit_depth: self.bit_depth(),
            duration_seconds: self.duration(),
            peak_dbfs: self.peak_dbfs,
            original_format: self.original_format.clone(),
        }
    }
}

/// Reshape interleaved samples into a `frames x channels` matrix.
pub fn frames_from_interleaved(samples: Vec<f32>, channels: u16) -> Result<Array2<f32>> {
    if channels == 0 {
        return Err(AudioProcError::load("Channel count cannot be 0"));
    }
    let channels = channels as usize;
    let frames = samples.len() / channels;
    let mut samples = samples;
    samples.truncate(frames * channels);

    Array2::from_shape_vec((frames, channels), samples)
        .map_err(|e| AudioProcError::load(format!("Invalid sample layout: {}", e)))
}

fn peak_dbfs_of(samples: ArrayView2<f32>) -> f64 {
    let peak = samples
        .iter()
        .filter(|x| x.is_finite())
        .map(|x| x.abs())
        .fold(0.0f32, f32::max);
    amplitude_to_dbfs(peak)
}

fn format_from_path(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Summary shown to the user after a successful load
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub channel_count: u16,
    pub sample_rate_hz: u32,
    pub bit_depth: u16,
    pub duration_seconds: f64,
    pub peak_dbfs: f64,
    pub original_format: String,
}

impl fmt::Display for AudioInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Channels: {}", self.channel_count)?;
        writeln!(f, "Sample rate: {} Hz", self.sample_rate_hz)?;
        writeln!(f, "Bit depth: {}", self.bit_depth)?;
        writeln!(f, "Duration: {:.3} s", self.duration_seconds)?;
        writeln!(f, "Peak: {:.2} dBFS", self.peak_dbfs)?;
        write!(f, "Original format: {}", self.original_format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dbfs_conversion() {
        assert_eq!(amplitude_to_dbfs(1.0), 0.0);
        assert!((amplitude_to_dbfs(0.5) - (-6.0206)).abs() < 1e-3);
        assert_eq!(amplitude_to_dbfs(0.0), f64::NEG_INFINITY);
        assert!((db_to_gain(-6.0206) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_header_validation() {
        assert!(AudioHeader::new(44100, 2, 2, 100).validate().is_ok());
        assert!(AudioHeader::new(0, 2, 2, 100).validate().is_err());
        assert!(AudioHeader::new(44100, 0, 2, 100).validate().is_err());
        assert!(AudioHeader::new(44100, 2, 5, 100).validate().is_err());
    }

    #[test]
    fn test_loaded_audio_properties() {
        let samples = array![[0.5, -0.25], [0.1, 0.2], [0.0, 0.0], [0.3, -0.3]];
        let audio = LoadedAudio::new(samples, 4, 3, "/music/Track.WAV").unwrap();

        assert_eq!(audio.channels(), 2);
        assert_eq!(audio.frames(), 4);
        assert_eq!(audio.bit_depth(), 24);
        assert!((audio.duration() - 1.0).abs() < f64::EPSILON);
        assert!((audio.peak_dbfs() - amplitude_to_dbfs(0.5)).abs() < 1e-9);
        assert_eq!(audio.original_format(), "wav");
    }

    #[test]
    fn test_derive_keeps_source_identity() {
        let audio = LoadedAudio::new(array![[0.5], [0.25]], 8000, 2, "in.flac").unwrap();
        let derived = audio.derive(array![[0.1], [0.1], [0.1]], 16000, 3);

        assert_eq!(derived.source_path(), Path::new("in.flac"));
        assert_eq!(derived.original_format(), "flac");
        assert_eq!(derived.sample_rate(), 16000);
        assert_eq!(derived.sample_width(), 3);
        assert!((derived.peak_dbfs() - amplitude_to_dbfs(0.1)).abs() < 1e-6);
    }

    #[test]
    fn test_frames_from_interleaved() {
        let frames = frames_from_interleaved(vec![0.1, 0.2, 0.3, 0.4, 0.5], 2).unwrap();
        assert_eq!(frames.dim(), (2, 2));
        assert_eq!(frames[[1, 0]], 0.3);
        assert!(frames_from_interleaved(vec![0.1], 0).is_err());
    }

    #[test]
    fn test_info_display() {
        let audio = LoadedAudio::new(array![[0.5], [0.5]], 2, 2, "a.mp3").unwrap();
        let text = audio.info().to_string();
        assert!(text.contains("Channels: 1"));
        assert!(text.contains("Original format: mp3"));
    }
}
