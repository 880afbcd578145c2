//! Four-stage processing pipeline
//!
//! Stages run in a fixed order on one loaded buffer: channels,
//! normalization, sample rate, export. Each stage either passes the buffer
//! through or replaces it with a new value, then reports the midpoint of its
//! progress range.

use std::fmt;
use std::sync::Arc;
use log::{debug, info, warn};

use crate::audio::{AudioBackend, LoadedAudio};
use crate::error::{AudioProcError, ProcessingError, Result};
use crate::processing::params::{FormatOptions, JobParams, ValidatedParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Channels,
    Normalization,
    SampleRate,
    Export,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Channels, Stage::Normalization, Stage::SampleRate, Stage::Export];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Channels => "channel",
            Stage::Normalization => "normalization",
            Stage::SampleRate => "sample-rate",
            Stage::Export => "export",
        }
    }

    /// Share of the progress bar allotted to this stage, in percent
    pub fn progress_range(&self) -> (u8, u8) {
        match self {
            Stage::Channels => (10, 30),
            Stage::Normalization => (30, 50),
            Stage::SampleRate => (50, 70),
            Stage::Export => (70, 100),
        }
    }

    pub fn progress_midpoint(&self) -> u8 {
        let (start, end) = self.progress_range();
        start + (end - start) / 2
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct Pipeline<B: AudioBackend> {
    backend: Arc<B>,
}

impl<B: AudioBackend> Pipeline<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Run every stage and return the buffer as it stood when it was encoded.
    pub fn process<F>(
        &self,
        audio: Arc<LoadedAudio>,
        job: &JobParams,
        mut on_progress: F,
    ) -> std::result::Result<LoadedAudio, ProcessingError>
    where
        F: FnMut(u8),
    {
        let params = job.params();
        let mut current = audio;

        for stage in Stage::ALL {
            let next = match stage {
                Stage::Channels => self.process_channels(&current, params),
                Stage::Normalization => self.process_normalization(&current, params),
                Stage::SampleRate => self.process_sample_rate(&current, params),
                Stage::Export => self.process_export(&current, job),
            }
            .map_err(|e| ProcessingError::stage(stage, e))?;

            match next {
                Some(next) => {
                    debug!("{} stage produced {} frames", stage, next.frames());
                    current = Arc::new(next);
                }
                None => debug!("{} stage skipped", stage),
            }

            on_progress(stage.progress_midpoint());
        }

        Ok(Arc::unwrap_or_clone(current))
    }

    fn process_channels(&self, audio: &LoadedAudio, params: &ValidatedParams) -> Result<Option<LoadedAudio>> {
        if !params.mono {
            return Ok(None);
        }
        info!("Downmixing {} channels to mono", audio.channels());
        self.backend.downmix(audio).map(Some)
    }

    fn process_normalization(&self, audio: &LoadedAudio, params: &ValidatedParams) -> Result<Option<LoadedAudio>> {
        let Some(target_db) = params.normalize_target_db else {
            return Ok(None);
        };

        let peak_db = self.backend.peak_dbfs(audio);
        if !peak_db.is_finite() {
            warn!("Audio is silent, skipping normalization");
            return Ok(None);
        }

        let gain_db = target_db - peak_db;
        info!("Normalizing peak {:.2} dBFS to {:.2} dBFS (gain {:+.2} dB)", peak_db, target_db, gain_db);
        self.backend.apply_gain(audio, gain_db).map(Some)
    }

    fn process_sample_rate(&self, audio: &LoadedAudio, params: &ValidatedParams) -> Result<Option<LoadedAudio>> {
        match params.sample_rate_hz {
            Some(rate) if rate != audio.sample_rate() => {
                info!("Resampling {} Hz -> {} Hz", audio.sample_rate(), rate);
                self.backend.resample(audio, rate).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn process_export(&self, audio: &LoadedAudio, job: &JobParams) -> Result<Option<LoadedAudio>> {
        let format = job.params().format;

        let requantized = match format {
            FormatOptions::Wav { bit_depth: Some(bits) } => {
                if bits == 0 || bits % 8 != 0 {
                    return Err(AudioProcError::codec(format!("Unsupported WAV bit depth: {}", bits)));
                }
                info!("Setting sample width to {} bytes", bits / 8);
                Some(self.backend.set_sample_width(audio, bits / 8)?)
            }
            _ => None,
        };

        let encoded = requantized.as_ref().unwrap_or(audio);
        info!("Exporting {} to {}", format.format(), job.output_path().display());
        self.backend.encode(encoded, job.output_path(), &format.encode_options())?;

        Ok(requantized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;
    use ndarray::array;
    use crate::audio::{AudioConverter, EncodeOptions};
    use crate::processing::params::{validate, ProcessingParams};

    /// Backend that does real buffer math but records calls instead of writing files
    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<String>>,
        encoded: Mutex<Option<(LoadedAudio, EncodeOptions)>>,
        fail_encode: bool,
    }

    impl RecordingBackend {
        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AudioBackend for RecordingBackend {
        fn load(&self, _path: &Path) -> Result<LoadedAudio> {
            Err(AudioProcError::load("not used"))
        }

        fn downmix(&self, audio: &LoadedAudio) -> Result<LoadedAudio> {
            self.record("downmix");
            Ok(AudioConverter::downmix(audio))
        }

        fn apply_gain(&self, audio: &LoadedAudio, gain_db: f64) -> Result<LoadedAudio> {
            self.record("gain");
            AudioConverter::apply_gain(audio, gain_db)
        }

        fn resample(&self, audio: &LoadedAudio, sample_rate: u32) -> Result<LoadedAudio> {
            self.record("resample");
            AudioConverter::convert_sample_rate(audio, sample_rate)
        }

        fn set_sample_width(&self, audio: &LoadedAudio, sample_width: u16) -> Result<LoadedAudio> {
            self.record("width");
            AudioConverter::set_sample_width(audio, sample_width)
        }

        fn encode(&self, audio: &LoadedAudio, _path: &Path, options: &EncodeOptions) -> Result<()> {
            self.record("encode");
            if self.fail_encode {
                return Err(AudioProcError::io("disk full"));
            }
            *self.encoded.lock().unwrap() = Some((audio.clone(), *options));
            Ok(())
        }
    }

    fn stereo_audio() -> Arc<LoadedAudio> {
        let samples = array![[0.5, 0.1], [-0.2, -0.4], [0.3, 0.3], [0.0, 0.2]];
        Arc::new(LoadedAudio::new(samples, 8000, 2, "/in/song.wav").unwrap())
    }

    fn job(params: ProcessingParams) -> JobParams {
        JobParams::new(validate(&params).unwrap(), "/out/song_processed.wav").unwrap()
    }

    fn run(backend: &Arc<RecordingBackend>, params: ProcessingParams) -> (std::result::Result<LoadedAudio, ProcessingError>, Vec<u8>) {
        let pipeline = Pipeline::new(backend.clone());
        let mut progress = Vec::new();
        let result = pipeline.process(stereo_audio(), &job(params), |p| progress.push(p));
        (result, progress)
    }

    #[test]
    fn test_stage_midpoints() {
        let midpoints: Vec<u8> = Stage::ALL.iter().map(|s| s.progress_midpoint()).collect();
        assert_eq!(midpoints, vec![20, 40, 60, 85]);
    }

    #[test]
    fn test_all_stages_in_order() {
        let backend = Arc::new(RecordingBackend::default());
        let params = ProcessingParams {
            mono: true,
            normalize: true,
            normalize_target_db: Some("-3".into()),
            sample_rate_hz: Some(16000),
            format: FormatOptions::Wav { bit_depth: Some(24) },
        };

        let (result, progress) = run(&backend, params);
        let exported = result.unwrap();

        assert_eq!(progress, vec![20, 40, 60, 85]);
        assert_eq!(backend.calls(), vec!["downmix", "gain", "resample", "width", "encode"]);
        assert_eq!(exported.channels(), 1);
        assert_eq!(exported.sample_rate(), 16000);
        assert_eq!(exported.sample_width(), 3);
        assert_eq!(exported.source_path(), Path::new("/in/song.wav"));
    }

    #[test]
    fn test_disabled_stages_pass_through() {
        let backend = Arc::new(RecordingBackend::default());
        let params = ProcessingParams {
            format: FormatOptions::Wav { bit_depth: None },
            ..Default::default()
        };

        let (result, progress) = run(&backend, params);
        let exported = result.unwrap();

        assert_eq!(progress, vec![20, 40, 60, 85]);
        assert_eq!(backend.calls(), vec!["encode"]);
        assert_eq!(exported.samples(), stereo_audio().samples());
        assert_eq!(exported.channels(), 2);
        assert_eq!(exported.sample_rate(), 8000);
        assert_eq!(exported.bit_depth(), 16);
    }

    #[test]
    fn test_same_sample_rate_is_not_resampled() {
        let backend = Arc::new(RecordingBackend::default());
        let params = ProcessingParams { sample_rate_hz: Some(8000), ..Default::default() };
        let (result, _) = run(&backend, params);
        assert!(result.is_ok());
        assert!(!backend.calls().contains(&"resample".to_string()));
    }

    #[test]
    fn test_normalization_hits_target_after_downmix() {
        let backend = Arc::new(RecordingBackend::default());
        let params = ProcessingParams {
            mono: true,
            normalize: true,
            normalize_target_db: Some("-1.5".into()),
            ..Default::default()
        };

        let exported = run(&backend, params).0.unwrap();
        // the downmixed peak (0.3) differs from the stereo peak (0.5)
        assert!((exported.peak_dbfs() - (-1.5)).abs() < 0.01);
    }

    #[test]
    fn test_normalization_without_mono_uses_loaded_peak() {
        let backend = Arc::new(RecordingBackend::default());
        let params = ProcessingParams {
            normalize: true,
            normalize_target_db: Some("-12".into()),
            format: FormatOptions::Wav { bit_depth: None },
            ..Default::default()
        };

        let exported = run(&backend, params).0.unwrap();
        assert!((exported.peak_dbfs() - (-12.0)).abs() < 1e-3);
        let ratio = exported.samples()[[1, 1]] / stereo_audio().samples()[[1, 1]];
        let expected = exported.samples()[[0, 0]] / 0.5;
        assert!((ratio - expected).abs() < 1e-5);
    }

    #[test]
    fn test_silent_audio_skips_gain() {
        let backend = Arc::new(RecordingBackend::default());
        let silent = Arc::new(LoadedAudio::new(array![[0.0], [0.0]], 8000, 2, "s.wav").unwrap());
        let params = ProcessingParams {
            normalize: true,
            normalize_target_db: Some("-6".into()),
            ..Default::default()
        };

        let pipeline = Pipeline::new(backend.clone());
        let exported = pipeline.process(silent, &job(params), |_| {}).unwrap();
        assert!(!backend.calls().contains(&"gain".to_string()));
        assert_eq!(exported.peak_dbfs(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_mp3_keeps_sample_width() {
        for bitrate in [128, 192, 256, 320] {
            let backend = Arc::new(RecordingBackend::default());
            let params = ProcessingParams {
                format: FormatOptions::Mp3 { bitrate_kbps: Some(bitrate) },
                ..Default::default()
            };

            let exported = run(&backend, params).0.unwrap();
            assert_eq!(exported.sample_width(), 2);
            assert!(!backend.calls().contains(&"width".to_string()));

            let (encoded, options) = backend.encoded.lock().unwrap().clone().unwrap();
            assert_eq!(encoded.sample_width(), 2);
            assert_eq!(options, EncodeOptions::Mp3 { bitrate_kbps: bitrate });
        }
    }

    #[test]
    fn test_flac_passes_compression_level() {
        let backend = Arc::new(RecordingBackend::default());
        let params = ProcessingParams {
            format: FormatOptions::Flac { compression_level: Some(0) },
            ..Default::default()
        };

        run(&backend, params).0.unwrap();
        let (encoded, options) = backend.encoded.lock().unwrap().clone().unwrap();
        assert_eq!(options, EncodeOptions::Flac { compression_level: 0 });
        assert_eq!(encoded.sample_width(), 2);
    }

    #[test]
    fn test_invalid_wav_bit_depth_fails_export() {
        let backend = Arc::new(RecordingBackend::default());
        let params = ProcessingParams {
            format: FormatOptions::Wav { bit_depth: Some(12) },
            ..Default::default()
        };

        let (result, progress) = run(&backend, params);
        assert!(matches!(result, Err(ProcessingError::StageFailure { stage: Stage::Export, .. })));
        assert_eq!(progress, vec![20, 40, 60]);
    }

    #[test]
    fn test_encode_failure_aborts_with_cause() {
        let backend = Arc::new(RecordingBackend { fail_encode: true, ..Default::default() });
        let (result, progress) = run(&backend, ProcessingParams::default());

        let err = result.unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(matches!(err, ProcessingError::StageFailure { stage: Stage::Export, .. }));
        assert_eq!(progress, vec![20, 40, 60]);
    }
}
