//! Audio file decoding via symphonia

use std::fs::File;
use std::path::Path;
use log::{debug, info, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::audio::buffer::{frames_from_interleaved, LoadedAudio, MAX_SAMPLE_WIDTH};
use crate::error::{AudioProcError, Result};

/// File extensions offered by the file picker
pub const SUPPORTED_INPUT_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "aac", "m4a", "ogg"];

/// Sample width assumed for codecs that do not report one (lossy formats)
const DEFAULT_SAMPLE_WIDTH: u16 = 2;

pub fn is_supported_input<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_INPUT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode the default track of an audio file into memory.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<LoadedAudio> {
    let path = path.as_ref();

    let file = File::open(path).map_err(|e| {
        AudioProcError::load(format!("Cannot open audio file {}: {}", path.display(), e))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioProcError::load(format!("Unsupported audio format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioProcError::load("No decodable audio track found"))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudioProcError::load(format!("Unsupported codec: {}", e)))?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);
    let sample_width = codec_params
        .bits_per_sample
        .map(|bits| (bits.div_ceil(8) as u16).clamp(1, MAX_SAMPLE_WIDTH))
        .unwrap_or(DEFAULT_SAMPLE_WIDTH);

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(AudioProcError::load(format!("Error reading packet: {}", e)));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(AudioProcError::load(format!("Decode error: {}", e))),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count() as u16;

        let buf = sample_buf.get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
        if buf.capacity() < decoded.capacity() * spec.channels.count() {
            *buf = SampleBuffer::new(decoded.capacity() as u64, spec);
        }
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    debug!(
        "Decoded {}: {} samples, {} Hz, {} ch",
        path.display(),
        samples.len(),
        sample_rate,
        channels
    );

    let frames = frames_from_interleaved(samples, channels)?;
    let audio = LoadedAudio::new(frames, sample_rate, sample_width, path)?;

    info!(
        "Loaded {}: {:.2}s, {}Hz, {}ch, {}-bit, peak {:.2} dBFS",
        path.display(),
        audio.duration(),
        audio.sample_rate(),
        audio.channels(),
        audio.bit_depth(),
        audio.peak_dbfs()
    );

    Ok(audio)
}
