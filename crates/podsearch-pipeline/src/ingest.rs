//! Episode ingestion: transcribe, diarize, align, embed, index

use crate::config::ReingestPolicy;
use crate::context::PipelineContext;
use crate::error::{validate_episode_id, PipelineError, Result, Stage};
use podsearch_index::TranscriptIndex;
use podsearch_ml::{
    align, speaker_stats, DiarizationEngine, EmbeddingEngine, TranscriptionEngine,
};
use podsearch_types::{EnrichedSegment, IndexEntry};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub struct IngestionService {
    transcriber: Arc<dyn TranscriptionEngine>,
    diarizer: Arc<dyn DiarizationEngine>,
    embedder: Arc<dyn EmbeddingEngine>,
    index: Arc<TranscriptIndex>,
    policy: ReingestPolicy,
}

impl IngestionService {
    pub fn new(ctx: &PipelineContext, policy: ReingestPolicy) -> Self {
        Self {
            transcriber: ctx.transcriber.clone(),
            diarizer: ctx.diarizer.clone(),
            embedder: ctx.embedder.clone(),
            index: ctx.index.clone(),
            policy,
        }
    }

    /// Index one episode from an audio file, returning the number of segments written
    pub fn ingest_episode(&self, audio_path: &Path, episode_id: &str) -> Result<usize> {
        validate_episode_id(episode_id)?;

        tracing::info!("Ingesting episode {} from {:?}", episode_id, audio_path);
        let samples = podsearch_audio::load_audio_file(audio_path).map_err(PipelineError::Audio)?;

        self.ingest_samples(&samples, episode_id)
    }

    /// Index one episode from 16kHz mono samples.
    ///
    /// Nothing is written unless every stage succeeds; the episode's entries
    /// are then written in a single transaction.
    pub fn ingest_samples(&self, samples: &[f32], episode_id: &str) -> Result<usize> {
        validate_episode_id(episode_id)?;
        let start = Instant::now();

        let segments = self
            .transcriber
            .transcribe(samples)
            .map_err(PipelineError::adapter(Stage::Transcription))?;
        let turns = self
            .diarizer
            .diarize(samples)
            .map_err(PipelineError::adapter(Stage::Diarization))?;

        let enriched = align(&segments, &turns);
        let entries = self.embed_segments(episode_id, &enriched)?;
        let written = entries.len();

        match self.policy {
            ReingestPolicy::Overwrite => {
                self.index.upsert_batch(&entries)?;
                report_stale_entries(episode_id, self.index.count_episode(episode_id), written);
            }
            ReingestPolicy::Replace => {
                let removed = self.index.replace_episode(episode_id, &entries)?;
                tracing::debug!("Replaced {} earlier entries of {}", removed, episode_id);
            }
        }

        let stats = speaker_stats(&enriched);
        let unknown = enriched.iter().filter(|s| s.speaker.is_unknown()).count();
        tracing::info!(
            "Indexed episode {}: {} segments, {} speakers, {} unknown, in {:.2}s",
            episode_id,
            written,
            stats.len() - usize::from(unknown > 0),
            unknown,
            start.elapsed().as_secs_f64()
        );

        Ok(written)
    }

    fn embed_segments(
        &self,
        episode_id: &str,
        segments: &[EnrichedSegment],
    ) -> Result<Vec<IndexEntry>> {
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .map_err(PipelineError::adapter(Stage::Embedding))?;

        if embeddings.len() != segments.len() {
            return Err(PipelineError::Adapter {
                stage: Stage::Embedding,
                error: anyhow::anyhow!(
                    "embedder returned {} vectors for {} segments",
                    embeddings.len(),
                    segments.len()
                ),
            });
        }

        Ok(segments
            .iter()
            .cloned()
            .zip(embeddings)
            .enumerate()
            .map(|(idx, (segment, embedding))| {
                IndexEntry::from_segment(episode_id, idx, segment, embedding)
            })
            .collect())
    }
}

/// Warn about trailing entries left by a longer earlier run.
///
/// The batch is already committed here, so a failed count is only logged.
fn report_stale_entries(
    episode_id: &str,
    stored: podsearch_index::Result<u64>,
    written: usize,
) -> Option<u64> {
    let stored = match stored {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!("Could not count stored entries of {}: {}", episode_id, e);
            return None;
        }
    };

    let stale = stored.saturating_sub(written as u64);
    if stale > 0 {
        tracing::warn!(
            "Episode {} still has {} stale entries from an earlier, longer ingestion",
            episode_id,
            stale
        );
    }
    Some(stale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, seg, turn, FailingTranscriber, StubTranscriber};
    use podsearch_types::Speaker;

    fn three_segments() -> Vec<podsearch_types::TranscriptionSegment> {
        vec![
            seg("welcome to the show", 0.0, 2.0),
            seg("thanks for having me", 2.5, 4.0),
            seg("let's talk about rust", 3.5, 6.0),
        ]
    }

    #[test]
    fn test_ingest_writes_one_entry_per_segment() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(
            dir.path(),
            three_segments(),
            vec![turn(0.0, 2.0, "HOST"), turn(2.0, 5.0, "GUEST")],
        );
        let service = IngestionService::new(&ctx, ReingestPolicy::Overwrite);

        let written = service.ingest_samples(&[0.0; 16000], "ep1").unwrap();
        assert_eq!(written, 3);
        assert_eq!(ctx.index.count().unwrap(), 3);

        let first = ctx.index.get("ep1_0").unwrap().unwrap();
        assert_eq!(first.document, "welcome to the show");
        assert_eq!(first.metadata.speaker, Speaker::from("HOST"));
        assert_eq!(first.metadata.episode, "ep1");

        let second = ctx.index.get("ep1_1").unwrap().unwrap();
        assert_eq!(second.metadata.speaker.label(), "GUEST");

        // Straddles the end of the guest turn
        let third = ctx.index.get("ep1_2").unwrap().unwrap();
        assert!(third.metadata.speaker.is_unknown());
        assert_eq!(third.metadata.start, 3.5);
        assert_eq!(third.metadata.end, 6.0);
    }

    #[test]
    fn test_reingest_identical_input_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), three_segments(), vec![turn(0.0, 10.0, "HOST")]);
        let service = IngestionService::new(&ctx, ReingestPolicy::Overwrite);

        service.ingest_samples(&[0.0; 160], "ep1").unwrap();
        let before: Vec<_> = (0..3)
            .map(|i| ctx.index.get(&format!("ep1_{}", i)).unwrap().unwrap())
            .collect();

        service.ingest_samples(&[0.0; 160], "ep1").unwrap();
        let after: Vec<_> = (0..3)
            .map(|i| ctx.index.get(&format!("ep1_{}", i)).unwrap().unwrap())
            .collect();

        assert_eq!(before, after);
        assert_eq!(ctx.index.count().unwrap(), 3);
    }

    #[test]
    fn test_overwrite_leaves_stale_trailing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), three_segments(), vec![]);
        IngestionService::new(&ctx, ReingestPolicy::Overwrite)
            .ingest_samples(&[0.0; 160], "ep1")
            .unwrap();

        let shorter = PipelineContext::new(
            Arc::new(StubTranscriber(vec![seg("only one", 0.0, 1.0)])),
            ctx.diarizer.clone(),
            ctx.embedder.clone(),
            ctx.index.clone(),
        );
        let written = IngestionService::new(&shorter, ReingestPolicy::Overwrite)
            .ingest_samples(&[0.0; 160], "ep1")
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(ctx.index.get("ep1_0").unwrap().unwrap().document, "only one");
        assert_eq!(ctx.index.count_episode("ep1").unwrap(), 3);
    }

    #[test]
    fn test_replace_policy_removes_stale_entries() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), three_segments(), vec![]);
        IngestionService::new(&ctx, ReingestPolicy::Replace)
            .ingest_samples(&[0.0; 160], "ep1")
            .unwrap();

        let shorter = PipelineContext::new(
            Arc::new(StubTranscriber(vec![seg("only one", 0.0, 1.0)])),
            ctx.diarizer.clone(),
            ctx.embedder.clone(),
            ctx.index.clone(),
        );
        IngestionService::new(&shorter, ReingestPolicy::Replace)
            .ingest_samples(&[0.0; 160], "ep1")
            .unwrap();

        assert_eq!(ctx.index.count_episode("ep1").unwrap(), 1);
        assert!(ctx.index.get("ep1_1").unwrap().is_none());
    }

    #[test]
    fn test_adapter_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), vec![], vec![]);
        let failing = PipelineContext::new(
            Arc::new(FailingTranscriber),
            ctx.diarizer.clone(),
            ctx.embedder.clone(),
            ctx.index.clone(),
        );

        let err = IngestionService::new(&failing, ReingestPolicy::Overwrite)
            .ingest_samples(&[0.0; 160], "ep1")
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Adapter {
                stage: Stage::Transcription,
                ..
            }
        ));
        assert_eq!(ctx.index.count().unwrap(), 0);
    }

    #[test]
    fn test_invalid_episode_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), three_segments(), vec![]);
        let service = IngestionService::new(&ctx, ReingestPolicy::Overwrite);

        assert!(matches!(
            service.ingest_samples(&[0.0; 160], ""),
            Err(PipelineError::InvalidEpisodeId(_))
        ));
        assert!(matches!(
            service.ingest_episode(Path::new("x.wav"), "a/b"),
            Err(PipelineError::InvalidEpisodeId(_))
        ));
    }

    #[test]
    fn test_ingest_episode_from_wav_file() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("temp_ep7.wav");
        podsearch_audio::write_wav(&audio, &vec![0.0; 8000], 8000).unwrap();

        let ctx = context(dir.path(), three_segments(), vec![]);
        let written = IngestionService::new(&ctx, ReingestPolicy::Overwrite)
            .ingest_episode(&audio, "ep7")
            .unwrap();

        assert_eq!(written, 3);
        assert!(ctx.index.get("ep7_2").unwrap().is_some());
    }

    #[test]
    fn test_missing_audio_file_is_audio_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), three_segments(), vec![]);
        let err = IngestionService::new(&ctx, ReingestPolicy::Overwrite)
            .ingest_episode(&dir.path().join("missing.mp3"), "ep1")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Audio(_)));
    }

    #[test]
    fn test_stale_count_failure_is_not_an_ingest_error() {
        let failed = Err(podsearch_index::IndexError::InvalidValue(
            "count unavailable".to_string(),
        ));
        assert_eq!(report_stale_entries("ep1", failed, 3), None);
        assert_eq!(report_stale_entries("ep1", Ok(5), 3), Some(2));
        assert_eq!(report_stale_entries("ep1", Ok(3), 3), Some(0));
    }
}
