//! Audio encoding
//!
//! - WAV (via hound), written at the buffer's sample width
//! - FLAC (via flac-bound), written at the buffer's sample width
//! - MP3 (via mp3lame-encoder), 16-bit PCM into LAME at a constant bitrate

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::audio::buffer::LoadedAudio;
use crate::audio::converter::full_scale;
use crate::error::{AudioProcError, ProcessingError, Result};

/// CBR rates the LAME encoder is configured with
pub const MP3_BITRATES_KBPS: &[u32] = &[
    8, 16, 24, 32, 40, 48, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];

pub const MAX_FLAC_COMPRESSION_LEVEL: u8 = 8;

/// Widest sample libFLAC encodes portably
const MAX_FLAC_BITS_PER_SAMPLE: u16 = 24;

/// Frames handed to the FLAC encoder per call
const FLAC_BLOCK_FRAMES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Wav,
    Mp3,
    Flac,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Flac => "flac",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ProcessingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            "flac" => Ok(OutputFormat::Flac),
            other => Err(ProcessingError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Encoder parameters. Sample width is a buffer property and is not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeOptions {
    Wav,
    Mp3 { bitrate_kbps: u32 },
    Flac { compression_level: u8 },
}

impl EncodeOptions {
    pub fn format(&self) -> OutputFormat {
        match self {
            EncodeOptions::Wav => OutputFormat::Wav,
            EncodeOptions::Mp3 { .. } => OutputFormat::Mp3,
            EncodeOptions::Flac { .. } => OutputFormat::Flac,
        }
    }
}

/// Audio encoder trait
pub trait AudioEncoder {
    /// Encode audio buffer to bytes
    fn encode(&self, audio: &LoadedAudio) -> Result<Vec<u8>>;

    /// Get file extension
    fn extension(&self) -> &'static str;
}

/// Pick the encoder for a set of options
pub fn encoder_for(options: &EncodeOptions) -> Box<dyn AudioEncoder> {
    match *options {
        EncodeOptions::Wav => Box::new(WavEncoder),
        EncodeOptions::Mp3 { bitrate_kbps } => Box::new(LameMp3Encoder::new(bitrate_kbps)),
        EncodeOptions::Flac { compression_level } => Box::new(FlacEncoder::new(compression_level)),
    }
}

/// WAV encoder using hound
pub struct WavEncoder;

impl AudioEncoder for WavEncoder {
    fn encode(&self, audio: &LoadedAudio) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let spec = hound::WavSpec {
            channels: audio.channels(),
            sample_rate: audio.sample_rate(),
            bits_per_sample: audio.bit_depth(),
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::new(Cursor::new(&mut output), spec)
            .map_err(|e| AudioProcError::codec(format!("Cannot create WAV writer: {}", e)))?;

        let scale = full_scale(audio.sample_width());
        for &sample in audio.samples().iter() {
            let value = (sample.clamp(-1.0, 1.0) as f64 * scale).round();
            let written = match audio.sample_width() {
                1 => writer.write_sample(value as i8),
                2 => writer.write_sample(value as i16),
                _ => writer.write_sample(value as i32),
            };
            written.map_err(|e| AudioProcError::codec(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| AudioProcError::codec(format!("Failed to finalize WAV writing: {}", e)))?;

        Ok(output)
    }

    fn extension(&self) -> &'static str {
        "wav"
    }
}

/// FLAC encoder using flac-bound
pub struct FlacEncoder {
    compression_level: u8,
}

impl FlacEncoder {
    pub fn new(compression_level: u8) -> Self {
        Self { compression_level }
    }

    /// Bits written for a buffer; 32-bit buffers are stored as 24-bit.
    pub fn bits_per_sample(audio: &LoadedAudio) -> u16 {
        audio.bit_depth().min(MAX_FLAC_BITS_PER_SAMPLE)
    }
}

impl AudioEncoder for FlacEncoder {
    fn encode(&self, audio: &LoadedAudio) -> Result<Vec<u8>> {
        use flac_bound::{FlacEncoder as FlacEnc, WriteWrapper};

        if self.compression_level > MAX_FLAC_COMPRESSION_LEVEL {
            return Err(AudioProcError::codec(format!(
                "FLAC compression level must be 0-{}, got {}",
                MAX_FLAC_COMPRESSION_LEVEL, self.compression_level
            )));
        }

        let bits = Self::bits_per_sample(audio);
        let channels = audio.channels() as usize;
        debug!("FLAC: level {}, {} bit, {} ch", self.compression_level, bits, channels);

        let mut output = Vec::new();
        let encoder_config = FlacEnc::new()
            .ok_or_else(|| AudioProcError::codec("FLAC encoder init failed"))?
            .channels(channels as u32)
            .sample_rate(audio.sample_rate())
            .bits_per_sample(bits as u32)
            .compression_level(self.compression_level as u32);

        let mut wrapper = WriteWrapper(&mut output);
        let mut encoder = encoder_config
            .init_write(&mut wrapper)
            .map_err(|e| AudioProcError::codec(format!("FLAC init write failed: {:?}", e)))?;

        let scale = full_scale(bits / 8);
        let samples: Vec<i32> = audio
            .samples()
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) as f64 * scale).round() as i32)
            .collect();

        for block in samples.chunks(FLAC_BLOCK_FRAMES * channels) {
            encoder
                .process_interleaved(block, (block.len() / channels) as u32)
                .map_err(|e| AudioProcError::codec(format!("FLAC process failed: {:?}", e)))?;
        }

        encoder
            .finish()
            .map_err(|_| AudioProcError::codec("FLAC finish failed"))?;

        Ok(output)
    }

    fn extension(&self) -> &'static str {
        "flac"
    }
}

/// MP3 encoder using LAME via the mp3lame-encoder crate
pub struct LameMp3Encoder {
    bitrate_kbps: u32,
}

impl LameMp3Encoder {
    pub fn new(bitrate_kbps: u32) -> Self {
        Self { bitrate_kbps }
    }

    fn lame_bitrate(&self) -> Result<mp3lame_encoder::Bitrate> {
        use mp3lame_encoder::Bitrate;

        Ok(match self.bitrate_kbps {
            8 => Bitrate::Kbps8,
            16 => Bitrate::Kbps16,
            24 => Bitrate::Kbps24,
            32 => Bitrate::Kbps32,
            40 => Bitrate::Kbps40,
            48 => Bitrate::Kbps48,
            64 => Bitrate::Kbps64,
            80 => Bitrate::Kbps80,
            96 => Bitrate::Kbps96,
            112 => Bitrate::Kbps112,
            128 => Bitrate::Kbps128,
            160 => Bitrate::Kbps160,
            192 => Bitrate::Kbps192,
            224 => Bitrate::Kbps224,
            256 => Bitrate::Kbps256,
            320 => Bitrate::Kbps320,
            other => {
                return Err(AudioProcError::codec(format!("Unsupported MP3 bitrate: {} kbps", other)));
            }
        })
    }
}

impl AudioEncoder for LameMp3Encoder {
    fn encode(&self, audio: &LoadedAudio) -> Result<Vec<u8>> {
        use mp3lame_encoder::{Builder, DualPcm, FlushNoGap, Quality};

        let channels = audio.channels();
        if channels > 2 {
            return Err(AudioProcError::codec(format!(
                "MP3 supports at most 2 channels, got {}", channels
            )));
        }
        let bitrate = self.lame_bitrate()?;
        debug!("MP3: {} kbps, {} ch, {} Hz", self.bitrate_kbps, channels, audio.sample_rate());

        let mut builder = Builder::new().ok_or_else(|| AudioProcError::codec("LAME encoder init failed"))?;
        builder
            .set_num_channels(channels as u8)
            .map_err(|e| AudioProcError::codec(format!("LAME set channels failed: {:?}", e)))?;
        builder
            .set_sample_rate(audio.sample_rate())
            .map_err(|e| AudioProcError::codec(format!("LAME set sample rate failed: {:?}", e)))?;
        builder
            .set_brate(bitrate)
            .map_err(|e| AudioProcError::codec(format!("LAME set bitrate failed: {:?}", e)))?;
        builder
            .set_quality(Quality::Best)
            .map_err(|e| AudioProcError::codec(format!("LAME set quality failed: {:?}", e)))?;

        let mut encoder = builder
            .build()
            .map_err(|e| AudioProcError::codec(format!("LAME build failed: {:?}", e)))?;

        // LAME takes 16-bit PCM; mono is fed as identical left/right
        let to_pcm = |s: f32| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        let samples = audio.samples();
        let left: Vec<i16> = samples.column(0).iter().map(|&s| to_pcm(s)).collect();
        let right: Vec<i16> = if channels == 2 {
            samples.column(1).iter().map(|&s| to_pcm(s)).collect()
        } else {
            left.clone()
        };

        let mut mp3_output: Vec<u8> = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(left.len()));
        let input = DualPcm { left: &left, right: &right };

        let encoded_size = encoder
            .encode(input, mp3_output.spare_capacity_mut())
            .map_err(|e| AudioProcError::codec(format!("LAME encode failed: {:?}", e)))?;

        // SAFETY: the encoder initialized `encoded_size` bytes of spare capacity
        unsafe {
            mp3_output.set_len(encoded_size);
        }

        mp3_output.reserve(7200);
        let flush_size = encoder
            .flush::<FlushNoGap>(mp3_output.spare_capacity_mut())
            .map_err(|e| AudioProcError::codec(format!("LAME flush failed: {:?}", e)))?;

        // SAFETY: the flush initialized `flush_size` bytes past the current length
        unsafe {
            mp3_output.set_len(mp3_output.len() + flush_size);
        }

        Ok(mp3_output)
    }

    fn extension(&self) -> &'static str {
        "mp3"
    }
}
