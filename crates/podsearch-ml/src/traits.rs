//! ML engine traits

use anyhow::Result;
use podsearch_types::{DiarizationTurn, TranscriptionSegment};

/// Trait for transcription engines
pub trait TranscriptionEngine: Send + Sync {
    /// Engine name
    fn name(&self) -> &str;

    /// Transcribe 16kHz mono samples into segments ordered by start time
    fn transcribe(&self, samples: &[f32]) -> Result<Vec<TranscriptionSegment>>;
}

/// Trait for diarization engines
pub trait DiarizationEngine: Send + Sync {
    /// Engine name
    fn name(&self) -> &str;

    /// Diarize 16kHz mono samples into speaker turns ordered by start time
    fn diarize(&self, samples: &[f32]) -> Result<Vec<DiarizationTurn>>;
}

/// Trait for text embedding engines
pub trait EmbeddingEngine: Send + Sync {
    /// Engine name
    fn name(&self) -> &str;

    /// Length of every vector this engine returns
    fn dimension(&self) -> usize;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
