//! Decoder/codec collaborator used by the processing pipeline

use std::path::Path;
use log::{debug, info};

use crate::audio::buffer::LoadedAudio;
use crate::audio::converter::AudioConverter;
use crate::audio::decoder::decode_file;
use crate::audio::encoder::{encoder_for, EncodeOptions};
use crate::error::{AudioProcError, Result};

/// Signal-processing and codec operations the pipeline relies on.
///
/// Every transformation returns a new buffer; the input is left untouched.
pub trait AudioBackend: Send + Sync + 'static {
    fn load(&self, path: &Path) -> Result<LoadedAudio>;

    fn downmix(&self, audio: &LoadedAudio) -> Result<LoadedAudio>;

    fn apply_gain(&self, audio: &LoadedAudio, gain_db: f64) -> Result<LoadedAudio>;

    fn resample(&self, audio: &LoadedAudio, sample_rate: u32) -> Result<LoadedAudio>;

    fn set_sample_width(&self, audio: &LoadedAudio, sample_width: u16) -> Result<LoadedAudio>;

    fn encode(&self, audio: &LoadedAudio, path: &Path, options: &EncodeOptions) -> Result<()>;

    fn peak_dbfs(&self, audio: &LoadedAudio) -> f64 {
        audio.peak_dbfs()
    }
}

/// Backend built on symphonia, ndarray, hound, libFLAC and LAME
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for NativeBackend {
    fn load(&self, path: &Path) -> Result<LoadedAudio> {
        decode_file(path)
    }

    fn downmix(&self, audio: &LoadedAudio) -> Result<LoadedAudio> {
        Ok(AudioConverter::downmix(audio))
    }

    fn apply_gain(&self, audio: &LoadedAudio, gain_db: f64) -> Result<LoadedAudio> {
        AudioConverter::apply_gain(audio, gain_db)
    }

    fn resample(&self, audio: &LoadedAudio, sample_rate: u32) -> Result<LoadedAudio> {
        AudioConverter::convert_sample_rate(audio, sample_rate)
    }

    fn set_sample_width(&self, audio: &LoadedAudio, sample_width: u16) -> Result<LoadedAudio> {
        AudioConverter::set_sample_width(audio, sample_width)
    }

    fn encode(&self, audio: &LoadedAudio, path: &Path, options: &EncodeOptions) -> Result<()> {
        let encoder = encoder_for(options);
        debug!("Encoding {} with {:?}", encoder.extension(), options);
        let bytes = encoder.encode(audio)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AudioProcError::io(format!("Cannot create output directory: {}", e))
            })?;
        }

        std::fs::write(path, &bytes).map_err(|e| {
            AudioProcError::io(format!("Cannot write output file {}: {}", path.display(), e))
        })?;

        info!("Saved: {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}
