//! Audio processing crate for Podsearch
//!
//! Decodes episode audio for the ML engines and cuts playback snippets
//! for search results.
//!
//! # Features
//! - **Decoding** of WAV (hound) and MP3/M4A/OGG/FLAC (symphonia) to mono
//! - **Resampling** to the 16 kHz rate the engines expect (rubato)
//! - **Snippet extraction** of `[start, end)` second ranges to WAV

pub mod file_io;
pub mod resampling;
pub mod snippet;

pub use file_io::{
    decode_audio_file, is_supported_extension, write_wav, DecodedAudio, ASR_SAMPLE_RATE,
    SUPPORTED_EXTENSIONS,
};
pub use snippet::extract_slice;

/// Load audio from a file and return samples at 16kHz mono
pub fn load_audio_file(path: &std::path::Path) -> anyhow::Result<Vec<f32>> {
    file_io::load_audio_file(path)
}

/// Resample audio to target rate
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> anyhow::Result<Vec<f32>> {
    resampling::resample(samples, source_rate, target_rate)
}
