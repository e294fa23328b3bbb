//! Audio file I/O

use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;

/// Sample rate expected by the ASR and diarization engines
pub const ASR_SAMPLE_RATE: u32 = 16000;

/// File extensions accepted for episode audio
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "ogg", "flac"];

/// Decoded mono audio at the file's native sample rate
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Check whether a file extension is one we can decode
pub fn is_supported_extension(ext: &str) -> bool {
    let ext = ext.to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Load audio file and return samples at 16kHz mono
pub fn load_audio_file(path: &Path) -> Result<Vec<f32>> {
    let decoded = decode_audio_file(path)?;

    tracing::debug!(
        "Decoded {:?}: {:.1}s at {} Hz",
        path,
        decoded.duration(),
        decoded.sample_rate
    );

    crate::resampling::resample(&decoded.samples, decoded.sample_rate, ASR_SAMPLE_RATE)
}

/// Decode an audio file to mono samples, keeping its native sample rate
pub fn decode_audio_file(path: &Path) -> Result<DecodedAudio> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "wav" => load_wav(path),
        "mp3" | "m4a" | "ogg" | "flac" => load_with_symphonia(path, &ext),
        _ => anyhow::bail!("Unsupported audio format: {:?}", path),
    }
}

/// Write mono f32 samples as a 16-bit PCM WAV file
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {:?}", path))?;
    for &sample in samples {
        let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(sample_i16)?;
    }
    writer.finalize()?;

    Ok(())
}

fn downmix(samples: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels > 1 {
        samples
            .chunks(channels)
            .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    }
}

/// Load WAV file using hound
fn load_wav(path: &Path) -> Result<DecodedAudio> {
    let reader =
        WavReader::open(path).with_context(|| format!("Failed to open WAV file: {:?}", path))?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .context("Failed to read WAV samples")?,
        hound::SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_val))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .context("Failed to read WAV samples")?
        }
    };

    Ok(DecodedAudio {
        samples: downmix(samples, channels),
        sample_rate: spec.sample_rate,
    })
}

/// Load audio file using symphonia (supports mp3, m4a, ogg, flac)
fn load_with_symphonia(path: &Path, ext: &str) -> Result<DecodedAudio> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {:?}", path))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(ext);

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format.default_track().context("No audio track found")?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Unknown sample rate")?;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Skipping undecodable packet in {:?}: {}", path, e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let spec = *decoded.spec();
        channels = spec.channels.count();

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(DecodedAudio {
        samples: downmix(samples, channels),
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_stereo_wav(path: &Path, frames: usize, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(16384_i16).unwrap();
            writer.write_sample(0_i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_wav_downmixes_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_stereo_wav(&path, 8000, 8000);

        let decoded = decode_audio_file(&path).unwrap();
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.samples.len(), 8000);
        assert!((decoded.duration() - 1.0).abs() < 1e-9);
        // Left channel at half scale, right silent
        assert!((decoded.samples[0] - 0.25).abs() < 0.01);
    }

    #[test]
    fn test_load_audio_file_returns_16khz() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("native16k.wav");
        write_wav(&path, &vec![0.1; 16000], ASR_SAMPLE_RATE).unwrap();

        let samples = load_audio_file(&path).unwrap();
        assert_eq!(samples.len(), 16000);
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let err = decode_audio_file(Path::new("episode.txt")).unwrap_err();
        assert!(err.to_string().contains("Unsupported audio format"));
    }

    #[test]
    fn test_is_supported_extension() {
        assert!(is_supported_extension("MP3"));
        assert!(is_supported_extension("m4a"));
        assert!(!is_supported_extension("txt"));
    }
}
