//! Audio snippet extraction for search-result playback

use crate::file_io::{decode_audio_file, write_wav};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Cut `[start_secs, end_secs)` out of an audio file and write it as WAV.
///
/// The end is clamped to the audio duration. Returns the snippet path,
/// `snippet_{stem}_{start}s_{end}s.wav` inside `output_dir`.
pub fn extract_slice(
    audio_path: &Path,
    start_secs: u32,
    end_secs: u32,
    output_dir: &Path,
) -> Result<PathBuf> {
    if end_secs <= start_secs {
        anyhow::bail!(
            "Invalid snippet range: start={}s, end={}s",
            start_secs,
            end_secs
        );
    }

    let audio = decode_audio_file(audio_path)?;
    let rate = audio.sample_rate as usize;

    let start = start_secs as usize * rate;
    if start >= audio.samples.len() {
        anyhow::bail!(
            "Snippet start {}s is past the end of {:?} ({:.1}s)",
            start_secs,
            audio_path,
            audio.duration()
        );
    }
    let end = (end_secs as usize * rate).min(audio.samples.len());

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create snippet directory: {:?}", output_dir))?;

    let stem = audio_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");
    let out_path = output_dir.join(format!("snippet_{}_{}s_{}s.wav", stem, start_secs, end_secs));

    write_wav(&out_path, &audio.samples[start..end], audio.sample_rate)?;

    tracing::debug!(
        "Extracted snippet {:?} ({} samples at {} Hz)",
        out_path,
        end - start,
        audio.sample_rate
    );

    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_wav(dir: &Path, seconds: usize) -> PathBuf {
        let path = dir.join("temp_ep1.wav");
        let rate = 8000;
        let samples: Vec<f32> = (0..seconds * rate)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        write_wav(&path, &samples, rate as u32).unwrap();
        path
    }

    #[test]
    fn test_extract_slice_covers_requested_range() {
        let dir = tempfile::tempdir().unwrap();
        let source = tone_wav(dir.path(), 5);
        let out_dir = dir.path().join("snippets");

        let snippet = extract_slice(&source, 1, 3, &out_dir).unwrap();
        assert_eq!(
            snippet.file_name().unwrap().to_str().unwrap(),
            "snippet_temp_ep1_1s_3s.wav"
        );

        let reader = hound::WavReader::open(&snippet).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        assert_eq!(reader.duration(), 2 * 8000);
    }

    #[test]
    fn test_extract_slice_clamps_end_to_duration() {
        let dir = tempfile::tempdir().unwrap();
        let source = tone_wav(dir.path(), 2);

        let snippet = extract_slice(&source, 1, 10, dir.path()).unwrap();
        let reader = hound::WavReader::open(&snippet).unwrap();
        assert_eq!(reader.duration(), 8000);
    }

    #[test]
    fn test_extract_slice_rejects_empty_range() {
        let dir = tempfile::tempdir().unwrap();
        let source = tone_wav(dir.path(), 2);
        assert!(extract_slice(&source, 2, 2, dir.path()).is_err());
    }

    #[test]
    fn test_extract_slice_rejects_start_past_end() {
        let dir = tempfile::tempdir().unwrap();
        let source = tone_wav(dir.path(), 2);
        assert!(extract_slice(&source, 5, 6, dir.path()).is_err());
    }
}
