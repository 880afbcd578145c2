//! Buffer transformations: downmix, gain, resampling, re-quantization

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use crate::audio::buffer::{db_to_gain, LoadedAudio, MAX_SAMPLE_WIDTH};
use crate::error::{AudioProcError, Result};

pub struct AudioConverter;

impl AudioConverter {
    /// Average all channels into one
    pub fn downmix(audio: &LoadedAudio) -> LoadedAudio {
        if audio.channels() == 1 {
            return audio.clone();
        }

        let mono = audio
            .samples()
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(audio.frames()));

        audio.derive(mono.insert_axis(Axis(1)), audio.sample_rate(), audio.sample_width())
    }

    /// Scale every sample by `gain_db`
    pub fn apply_gain(audio: &LoadedAudio, gain_db: f64) -> Result<LoadedAudio> {
        if !gain_db.is_finite() {
            return Err(AudioProcError::codec(format!("Invalid gain: {} dB", gain_db)));
        }

        let factor = db_to_gain(gain_db);
        let mut samples = audio.samples().to_owned();
        match samples.as_slice_mut() {
            Some(slice) => slice.par_iter_mut().for_each(|s| *s *= factor),
            None => samples.mapv_inplace(|s| s * factor),
        }

        Ok(audio.derive(samples, audio.sample_rate(), audio.sample_width()))
    }

    /// Convert sample rate using linear interpolation
    pub fn convert_sample_rate(audio: &LoadedAudio, target_sample_rate: u32) -> Result<LoadedAudio> {
        if target_sample_rate == 0 {
            return Err(AudioProcError::codec("Target sample rate must be greater than 0"));
        }
        if audio.sample_rate() == target_sample_rate {
            return Ok(audio.clone());
        }

        let ratio = target_sample_rate as f64 / audio.sample_rate() as f64;
        let new_length = (audio.frames() as f64 * ratio) as usize;
        let channels = audio.channels() as usize;

        let mut resampled = Array2::zeros((new_length, channels));
        if audio.frames() > 0 {
            for (ch, column) in audio.samples().axis_iter(Axis(1)).enumerate() {
                let converted = Self::resample_channel(column, new_length, ratio)?;
                resampled.column_mut(ch).assign(&converted);
            }
        }

        Ok(audio.derive(resampled, target_sample_rate, audio.sample_width()))
    }

    fn resample_channel(data: ArrayView1<f32>, new_length: usize, ratio: f64) -> Result<Array1<f32>> {
        if data.is_empty() {
            return Err(AudioProcError::codec("Input data is empty"));
        }

        let old_length = data.len();
        let mut new_data = Array1::zeros(new_length);

        for i in 0..new_length {
            let old_pos = i as f64 / ratio;
            let old_index = old_pos.floor() as usize;
            let fraction = old_pos - old_index as f64;

            new_data[i] = if old_index >= old_length - 1 {
                data[old_length - 1]
            } else {
                data[old_index] + (data[old_index + 1] - data[old_index]) * fraction as f32
            };
        }

        Ok(new_data)
    }

    /// Re-quantize samples to `sample_width` bytes per sample
    pub fn set_sample_width(audio: &LoadedAudio, sample_width: u16) -> Result<LoadedAudio> {
        if sample_width == 0 || sample_width > MAX_SAMPLE_WIDTH {
            return Err(AudioProcError::codec(format!(
                "Unsupported sample width: {} bytes", sample_width
            )));
        }
        if audio.sample_width() == sample_width {
            return Ok(audio.clone());
        }

        let full_scale = full_scale(sample_width);
        let samples = audio
            .samples()
            .mapv(|s| ((s.clamp(-1.0, 1.0) as f64 * full_scale).round() / full_scale) as f32);

        Ok(audio.derive(samples, audio.sample_rate(), sample_width))
    }
}

/// Largest positive integer sample for a width in bytes
pub fn full_scale(sample_width: u16) -> f64 {
    ((1i64 << (sample_width as u32 * 8 - 1)) - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stereo() -> LoadedAudio {
        LoadedAudio::new(array![[0.5, 0.1], [-0.5, -0.3], [0.2, 0.2]], 8000, 2, "s.wav").unwrap()
    }

    #[test]
    fn test_downmix_averages_channels() {
        let mono = AudioConverter::downmix(&stereo());
        assert_eq!(mono.channels(), 1);
        assert_eq!(mono.frames(), 3);
        assert!((mono.samples()[[0, 0]] - 0.3).abs() < 1e-6);
        assert!((mono.samples()[[1, 0]] + 0.4).abs() < 1e-6);
        assert!((mono.samples()[[2, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_downmix_mono_is_identity() {
        let audio = LoadedAudio::new(array![[0.1], [0.2]], 8000, 2, "m.wav").unwrap();
        let out = AudioConverter::downmix(&audio);
        assert_eq!(out.samples(), audio.samples());
    }

    #[test]
    fn test_apply_gain_moves_peak() {
        let audio = stereo();
        let louder = AudioConverter::apply_gain(&audio, 3.0).unwrap();
        assert!((louder.peak_dbfs() - (audio.peak_dbfs() + 3.0)).abs() < 1e-4);
        assert!(AudioConverter::apply_gain(&audio, f64::INFINITY).is_err());
    }

    #[test]
    fn test_resample_same_rate() {
        let result = AudioConverter::convert_sample_rate(&stereo(), 8000).unwrap();
        assert_eq!(result.sample_rate(), 8000);
        assert_eq!(result.frames(), 3);
    }

    #[test]
    fn test_resample_upsample() {
        let audio = LoadedAudio::new(array![[0.0, 0.0], [1.0, -1.0]], 8000, 2, "u.wav").unwrap();
        let result = AudioConverter::convert_sample_rate(&audio, 16000).unwrap();
        assert_eq!(result.sample_rate(), 16000);
        assert_eq!(result.frames(), 4);
        assert_eq!(result.channels(), 2);
        assert!((result.samples()[[1, 0]] - 0.5).abs() < 1e-6);
        assert!((result.samples()[[1, 1]] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_resample_rejects_zero_rate() {
        assert!(AudioConverter::convert_sample_rate(&stereo(), 0).is_err());
    }

    #[test]
    fn test_set_sample_width_quantizes() {
        let audio = LoadedAudio::new(array![[0.123456789]], 8000, 4, "q.wav").unwrap();
        let eight_bit = AudioConverter::set_sample_width(&audio, 1).unwrap();
        assert_eq!(eight_bit.sample_width(), 1);
        let value = eight_bit.samples()[[0, 0]] as f64 * 127.0;
        assert!((value - value.round()).abs() < 1e-3);

        let deep = AudioConverter::set_sample_width(&audio, 3).unwrap();
        assert_eq!(deep.bit_depth(), 24);
        assert!(AudioConverter::set_sample_width(&audio, 0).is_err());
        assert!(AudioConverter::set_sample_width(&audio, 5).is_err());
    }

    #[test]
    fn test_full_scale() {
        assert_eq!(full_scale(1), 127.0);
        assert_eq!(full_scale(2), 32767.0);
        assert_eq!(full_scale(3), 8388607.0);
        assert_eq!(full_scale(4), 2147483647.0);
    }
}
