//! Stub engines for pipeline tests

use crate::context::PipelineContext;
use anyhow::Result;
use podsearch_index::{CollectionConfig, OpenMode, TranscriptIndex};
use podsearch_ml::{DiarizationEngine, EmbeddingEngine, TranscriptionEngine};
use podsearch_types::{DiarizationTurn, DistanceMetric, TranscriptionSegment};
use std::path::Path;
use std::sync::Arc;

pub const STUB_DIMENSION: usize = 4;

pub fn seg(text: &str, start: f64, end: f64) -> TranscriptionSegment {
    TranscriptionSegment::new(text, start, end)
}

pub fn turn(start: f64, end: f64, speaker: &str) -> DiarizationTurn {
    DiarizationTurn::new(start, end, speaker)
}

pub struct StubTranscriber(pub Vec<TranscriptionSegment>);

impl TranscriptionEngine for StubTranscriber {
    fn name(&self) -> &str {
        "stub-asr"
    }

    fn transcribe(&self, _samples: &[f32]) -> Result<Vec<TranscriptionSegment>> {
        Ok(self.0.clone())
    }
}

pub struct FailingTranscriber;

impl TranscriptionEngine for FailingTranscriber {
    fn name(&self) -> &str {
        "failing-asr"
    }

    fn transcribe(&self, _samples: &[f32]) -> Result<Vec<TranscriptionSegment>> {
        anyhow::bail!("model crashed")
    }
}

pub struct StubDiarizer(pub Vec<DiarizationTurn>);

impl DiarizationEngine for StubDiarizer {
    fn name(&self) -> &str {
        "stub-diarization"
    }

    fn diarize(&self, _samples: &[f32]) -> Result<Vec<DiarizationTurn>> {
        Ok(self.0.clone())
    }
}

/// Deterministic embedding: byte counts bucketed by `byte % 3`, plus a bias term
pub struct StubEmbedder;

impl EmbeddingEngine for StubEmbedder {
    fn name(&self) -> &str {
        "stub-embedding"
    }

    fn dimension(&self) -> usize {
        STUB_DIMENSION
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; STUB_DIMENSION];
        for b in text.bytes() {
            v[(b % 3) as usize] += 1.0;
        }
        v[3] = 1.0;
        Ok(v)
    }
}

pub fn open_index(dir: &Path) -> TranscriptIndex {
    TranscriptIndex::open(
        dir.join("index"),
        CollectionConfig {
            name: "test".to_string(),
            dimension: STUB_DIMENSION,
            metric: DistanceMetric::Cosine,
        },
        OpenMode::CreateIfMissing,
    )
    .unwrap()
}

pub fn context(
    dir: &Path,
    segments: Vec<TranscriptionSegment>,
    turns: Vec<DiarizationTurn>,
) -> PipelineContext {
    PipelineContext::new(
        Arc::new(StubTranscriber(segments)),
        Arc::new(StubDiarizer(turns)),
        Arc::new(StubEmbedder),
        Arc::new(open_index(dir)),
    )
}
