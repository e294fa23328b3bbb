//! Transcription through an external ASR program
//!
//! The program receives 16kHz mono float32 samples on stdin and prints
//! `{"segments": [{"text", "start", "end"}], "error"?}` on stdout.

use crate::subprocess::run_with_samples;
use crate::traits::TranscriptionEngine;
use anyhow::{Context, Result};
use podsearch_types::TranscriptionSegment;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Deserialize)]
struct CommandTranscriptionOutput {
    #[serde(default)]
    segments: Vec<CommandSegment>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommandSegment {
    text: String,
    start: f64,
    end: f64,
}

/// Subprocess-based transcription engine
pub struct CommandAsrEngine {
    binary_path: PathBuf,
    args: Vec<String>,
}

impl CommandAsrEngine {
    pub fn new(binary_path: impl Into<PathBuf>, args: Vec<String>) -> Result<Self> {
        let binary_path = binary_path.into();
        tracing::info!("CommandAsrEngine: using {:?} {:?}", binary_path, args);
        Ok(Self { binary_path, args })
    }

    fn parse_output(stdout: &[u8]) -> Result<Vec<TranscriptionSegment>> {
        let result: CommandTranscriptionOutput =
            serde_json::from_slice(stdout).context("Failed to parse transcription result")?;

        if let Some(error) = result.error {
            anyhow::bail!("Transcription error: {}", error);
        }

        let mut segments: Vec<TranscriptionSegment> = result
            .segments
            .into_iter()
            .map(|seg| TranscriptionSegment {
                text: seg.text.trim().to_string(),
                start: seg.start,
                end: seg.end,
            })
            .collect();
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        Ok(segments)
    }
}

impl TranscriptionEngine for CommandAsrEngine {
    fn name(&self) -> &str {
        "command-asr"
    }

    fn transcribe(&self, samples: &[f32]) -> Result<Vec<TranscriptionSegment>> {
        if samples.is_empty() {
            tracing::warn!("CommandAsrEngine: received 0 samples, returning empty result");
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let stdout = run_with_samples(&self.binary_path, &self.args, &[], samples)?;
        let segments = Self::parse_output(&stdout)?;

        tracing::debug!(
            "CommandAsrEngine: {:.1}s audio in {:.2}s, {} segments",
            samples.len() as f64 / 16000.0,
            start.elapsed().as_secs_f64(),
            segments.len()
        );

        Ok(segments)
    }
}
