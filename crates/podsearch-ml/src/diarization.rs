//! Speaker diarization through an external program
//!
//! The program is spawned once per call, receives 16kHz mono float32
//! samples on stdin and prints JSON on stdout:
//! `{"segments": [{"speaker", "start", "end"}], "num_speakers"?, "error"?}`.
//! Speakers may be labelled by string ("SPEAKER_00") or integer (0).
//! `HF_TOKEN` is forwarded to the child when configured.

use crate::subprocess::run_with_samples;
use crate::traits::DiarizationEngine;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use podsearch_types::DiarizationTurn;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Instant;

/// Diarization configuration
#[derive(Debug, Clone, Default)]
pub struct CommandDiarizationConfig {
    /// Path to the diarization program
    pub binary_path: PathBuf,
    /// Extra arguments passed before the samples are streamed
    pub args: Vec<String>,
    /// Hugging Face token for gated pipeline models
    pub hf_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiarizationOutput {
    #[serde(default)]
    segments: Vec<DiarizationOutputSegment>,
    #[serde(default)]
    num_speakers: Option<usize>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiarizationOutputSegment {
    speaker: SpeakerLabel,
    start: f64,
    end: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SpeakerLabel {
    Index(u32),
    Name(String),
}

impl SpeakerLabel {
    fn into_label(self) -> String {
        match self {
            Self::Index(i) => format!("SPEAKER_{:02}", i),
            Self::Name(name) => name,
        }
    }
}

/// Subprocess-based speaker diarization engine
pub struct CommandDiarizationEngine {
    config: CommandDiarizationConfig,
    last_num_speakers: Mutex<usize>,
}

impl CommandDiarizationEngine {
    pub fn new(config: CommandDiarizationConfig) -> Result<Self> {
        tracing::info!(
            "CommandDiarizationEngine: using {:?} {:?} (hf token: {})",
            config.binary_path,
            config.args,
            if config.hf_token.is_some() { "set" } else { "not set" }
        );

        Ok(Self {
            config,
            last_num_speakers: Mutex::new(0),
        })
    }

    /// Get number of speakers from last diarization
    pub fn num_speakers(&self) -> usize {
        *self.last_num_speakers.lock()
    }

    fn parse_output(stdout: &[u8]) -> Result<(Vec<DiarizationTurn>, usize)> {
        let result: DiarizationOutput = serde_json::from_slice(stdout).with_context(|| {
            format!(
                "Failed to parse diarization result: {}",
                String::from_utf8_lossy(stdout)
            )
        })?;

        if let Some(error) = result.error {
            anyhow::bail!("Diarization error: {}", error);
        }

        let mut turns: Vec<DiarizationTurn> = result
            .segments
            .into_iter()
            .map(|seg| DiarizationTurn::new(seg.start, seg.end, seg.speaker.into_label()))
            .collect();
        turns.sort_by(|a, b| a.start.total_cmp(&b.start));

        let num_speakers = result.num_speakers.unwrap_or_else(|| {
            let mut labels: Vec<&str> = turns.iter().map(|t| t.speaker.as_str()).collect();
            labels.sort_unstable();
            labels.dedup();
            labels.len()
        });

        Ok((turns, num_speakers))
    }
}

impl DiarizationEngine for CommandDiarizationEngine {
    fn name(&self) -> &str {
        "command-diarization"
    }

    fn diarize(&self, samples: &[f32]) -> Result<Vec<DiarizationTurn>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let start_time = Instant::now();

        let envs: Vec<(&str, &str)> = self
            .config
            .hf_token
            .as_deref()
            .map(|token| vec![("HF_TOKEN", token)])
            .unwrap_or_default();

        let stdout = run_with_samples(&self.config.binary_path, &self.config.args, &envs, samples)?;
        let (turns, num_speakers) = Self::parse_output(&stdout)?;

        *self.last_num_speakers.lock() = num_speakers;

        tracing::info!(
            "Diarization: processed {:.1}s audio in {:.2}s, found {} turns from {} speakers",
            samples.len() as f64 / 16000.0,
            start_time.elapsed().as_secs_f64(),
            turns.len(),
            num_speakers
        );

        Ok(turns)
    }
}
