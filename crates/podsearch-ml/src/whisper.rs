//! Whisper transcription engine using whisper-rs
//!
//! Metal GPU acceleration on Apple Silicon is available through the `metal` feature.

use crate::traits::TranscriptionEngine;
use anyhow::{Context, Result};
use podsearch_types::TranscriptionSegment;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Instant;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Special whisper tokens such as [_TT_150], [_EOT_], [_BEG_]
fn special_tokens_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\[_[A-Z]+_?\d*\]").expect("valid special token regex"))
}

/// Strip special tokens and collapse whitespace
fn clean_special_tokens(text: &str) -> String {
    let cleaned = special_tokens_regex().replace_all(text, "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whisper timestamps are in centiseconds
fn centiseconds_to_secs(ts: i64) -> f64 {
    ts as f64 / 100.0
}

/// Whisper transcription engine
pub struct WhisperEngine {
    ctx: WhisperContext,
    language: String,
    threads: i32,
    use_gpu: bool,
}

impl TranscriptionEngine for WhisperEngine {
    fn name(&self) -> &str {
        "whisper"
    }

    fn transcribe(&self, samples: &[f32]) -> Result<Vec<TranscriptionSegment>> {
        let start = Instant::now();

        let mut state = self
            .ctx
            .create_state()
            .context("Failed to create Whisper state")?;

        state
            .full(self.create_params(), samples)
            .context("Whisper inference failed")?;

        let num_segments = state.full_n_segments();
        let mut segments = Vec::new();

        for i in 0..num_segments {
            let segment = match state.get_segment(i) {
                Some(seg) => seg,
                None => continue,
            };

            let text = match segment.to_str() {
                Ok(t) => t.to_string(),
                Err(_) => match segment.to_str_lossy() {
                    Ok(t) => t.to_string(),
                    Err(_) => continue,
                },
            };

            let clean_text = clean_special_tokens(text.trim());
            if clean_text.is_empty() {
                continue;
            }

            segments.push(TranscriptionSegment {
                text: clean_text,
                start: centiseconds_to_secs(segment.start_timestamp()),
                end: centiseconds_to_secs(segment.end_timestamp()),
            });
        }

        let elapsed = start.elapsed();
        let audio_duration = samples.len() as f64 / 16000.0;
        tracing::debug!(
            "Whisper: transcribed {:.1}s audio in {:.2}s (RTFx: {:.1}), {} segments",
            audio_duration,
            elapsed.as_secs_f64(),
            audio_duration / elapsed.as_secs_f64().max(f64::EPSILON),
            segments.len()
        );

        Ok(segments)
    }
}

impl WhisperEngine {
    /// Load a ggml Whisper model. `language` is an ISO code or "auto".
    pub fn new(model_path: &str, language: &str) -> Result<Self> {
        tracing::info!("Loading Whisper model from: {}", model_path);

        let use_gpu = cfg!(feature = "metal");
        let mut params = WhisperContextParameters::default();
        params.use_gpu(use_gpu);
        if use_gpu {
            params.flash_attn(true);
            tracing::info!("Whisper: Metal GPU acceleration enabled");
        } else {
            tracing::info!("Whisper: Using CPU inference");
        }

        let ctx = WhisperContext::new_with_params(model_path, params)
            .context("Failed to load Whisper model")?;

        tracing::info!("Whisper model loaded successfully");

        Ok(Self {
            ctx,
            language: language.to_string(),
            threads: 4,
            use_gpu,
        })
    }

    /// Set the number of CPU threads used for inference
    pub fn with_threads(mut self, threads: i32) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn is_gpu_enabled(&self) -> bool {
        self.use_gpu
    }

    fn create_params(&self) -> FullParams<'_, '_> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        if self.language != "auto" {
            params.set_language(Some(&self.language));
        }

        params.set_n_threads(self.threads);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        params
    }
}
