//! Audio Module
//!
//! Provides decoding, in-memory buffer transformations and encoding.
//! Decoding covers wav/mp3/flac/aac/ogg; encoding covers wav/mp3/flac.

pub mod backend;
pub mod buffer;
pub mod converter;
pub mod decoder;
pub mod encoder;

pub use backend::{AudioBackend, NativeBackend};
pub use buffer::{AudioHeader, AudioInfo, LoadedAudio};
pub use converter::AudioConverter;
pub use decoder::{decode_file, SUPPORTED_INPUT_EXTENSIONS};
pub use encoder::{AudioEncoder, EncodeOptions, OutputFormat};
