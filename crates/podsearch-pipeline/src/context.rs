//! Engines and index shared by the pipeline services
//!
//! Built once at process start and handed to the service constructors.

use crate::config::{EmbeddingProvider, Settings, TranscriptionBackend};
use anyhow::{Context, Result};
use podsearch_index::TranscriptIndex;
use podsearch_ml::{
    CommandAsrEngine, CommandDiarizationConfig, CommandDiarizationEngine, DiarizationEngine,
    EmbeddingEngine, OllamaEmbeddingConfig, OllamaEmbeddingEngine, TranscriptionEngine,
};
use std::sync::Arc;
use std::time::Duration;

pub struct PipelineContext {
    pub transcriber: Arc<dyn TranscriptionEngine>,
    pub diarizer: Arc<dyn DiarizationEngine>,
    pub embedder: Arc<dyn EmbeddingEngine>,
    pub index: Arc<TranscriptIndex>,
}

impl PipelineContext {
    pub fn new(
        transcriber: Arc<dyn TranscriptionEngine>,
        diarizer: Arc<dyn DiarizationEngine>,
        embedder: Arc<dyn EmbeddingEngine>,
        index: Arc<TranscriptIndex>,
    ) -> Self {
        Self {
            transcriber,
            diarizer,
            embedder,
            index,
        }
    }

    /// Load every engine named in `settings` and open the index
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let transcriber = build_transcriber(settings)?;
        let diarizer = build_diarizer(settings)?;
        let embedder = build_embedder(settings)?;

        let mode = settings.index_open_mode();
        let index_dir = settings.index_dir();
        let index = TranscriptIndex::open(
            &index_dir,
            settings.collection_config(embedder.dimension()),
            mode,
        )
        .with_context(|| format!("Failed to open index at {:?} ({:?})", index_dir, mode))?;

        if index.dimension() != embedder.dimension() {
            tracing::warn!(
                "Collection {} has dimension {}, but embedder {} produces {}",
                index.collection(),
                index.dimension(),
                embedder.name(),
                embedder.dimension()
            );
        }

        tracing::info!(
            "Pipeline ready: asr={}, diarization={}, embedding={}, collection={}",
            transcriber.name(),
            diarizer.name(),
            embedder.name(),
            index.collection()
        );

        Ok(Self::new(transcriber, diarizer, embedder, Arc::new(index)))
    }
}

fn build_transcriber(settings: &Settings) -> Result<Arc<dyn TranscriptionEngine>> {
    let config = &settings.transcription;
    match config.engine {
        TranscriptionBackend::Command => {
            let command = config
                .command
                .as_ref()
                .context("transcription.command is required for the command engine")?;
            Ok(Arc::new(CommandAsrEngine::new(
                settings.resolve(command),
                config.args.clone(),
            )?))
        }
        #[cfg(feature = "whisper")]
        TranscriptionBackend::Whisper => {
            let model_path = settings.resolve(&config.model_path);
            let model_path = model_path
                .to_str()
                .context("Whisper model path is not valid UTF-8")?;
            let engine = podsearch_ml::WhisperEngine::new(model_path, &config.language)?
                .with_threads(config.threads);
            Ok(Arc::new(engine))
        }
        #[cfg(not(feature = "whisper"))]
        TranscriptionBackend::Whisper => {
            anyhow::bail!("Whisper support is not compiled in (enable the `whisper` feature)")
        }
    }
}

fn build_diarizer(settings: &Settings) -> Result<Arc<dyn DiarizationEngine>> {
    let command = &settings.diarization.command;
    // Bare program names are looked up on PATH
    let binary_path = if command.components().count() > 1 {
        settings.resolve(command)
    } else {
        command.clone()
    };

    if settings.hf_token.is_none() {
        tracing::warn!("HF_TOKEN is not set; gated diarization models may fail to load");
    }

    Ok(Arc::new(CommandDiarizationEngine::new(
        CommandDiarizationConfig {
            binary_path,
            args: settings.diarization.args.clone(),
            hf_token: settings.hf_token.clone(),
        },
    )?))
}

fn build_embedder(settings: &Settings) -> Result<Arc<dyn EmbeddingEngine>> {
    let config = &settings.embedding;
    match config.provider {
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbeddingEngine::new(
            OllamaEmbeddingConfig {
                model: config.model.clone(),
                url: config.url.clone(),
                dimension: config.dimension,
                timeout: Duration::from_secs(config.timeout_secs),
            },
        )?)),
        #[cfg(feature = "onnx")]
        EmbeddingProvider::Onnx => Ok(Arc::new(podsearch_ml::OnnxEmbeddingEngine::new(
            podsearch_ml::OnnxEmbeddingConfig {
                model_path: settings.resolve(&config.model_path),
                tokenizer_path: settings.resolve(&config.tokenizer_path),
                dimension: config.dimension,
                max_tokens: config.max_tokens,
                use_token_type_ids: config.use_token_type_ids,
            },
        )?)),
        #[cfg(not(feature = "onnx"))]
        EmbeddingProvider::Onnx => {
            anyhow::bail!("ONNX support is not compiled in (enable the `onnx` feature)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranscriptionSettings;

    #[test]
    fn test_from_settings_with_subprocess_engines_and_ollama() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::load_from(&dir.path().join("config.json"), dir.path());
        settings.transcription = TranscriptionSettings {
            engine: TranscriptionBackend::Command,
            command: Some("/usr/bin/asr".into()),
            ..Default::default()
        };
        settings.embedding.provider = EmbeddingProvider::Ollama;
        settings.embedding.dimension = 8;

        let ctx = PipelineContext::from_settings(&settings).unwrap();
        assert_eq!(ctx.transcriber.name(), "command-asr");
        assert_eq!(ctx.diarizer.name(), "command-diarization");
        assert_eq!(ctx.embedder.name(), "ollama");
        assert_eq!(ctx.index.dimension(), 8);
        assert!(settings.index_dir().join(podsearch_index::INDEX_FILE_NAME).exists());
    }

    #[test]
    fn test_command_engine_requires_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::load_from(&dir.path().join("config.json"), dir.path());
        settings.transcription.engine = TranscriptionBackend::Command;
        settings.embedding.provider = EmbeddingProvider::Ollama;

        assert!(PipelineContext::from_settings(&settings).is_err());
    }

    #[test]
    fn test_preindexed_directory_without_collection_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::load_from(&dir.path().join("config.json"), dir.path());
        settings.transcription.engine = TranscriptionBackend::Command;
        settings.transcription.command = Some("/usr/bin/asr".into());
        settings.embedding.provider = EmbeddingProvider::Ollama;
        settings.index.use_preindexed = true;
        std::fs::create_dir_all(settings.index_dir()).unwrap();

        let err = PipelineContext::from_settings(&settings).err().unwrap();
        assert!(format!("{:#}", err).contains("collection not found"));
    }
}
