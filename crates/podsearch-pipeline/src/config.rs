//! Settings loaded from `config.json` in the data directory
//!
//! Relative paths in the file are resolved against the data directory.
//! Environment overrides: `PODSEARCH_DATA_DIR`, `PODSEARCH_CONFIG`, `HF_TOKEN`.

use anyhow::{Context, Result};
use podsearch_index::{CollectionConfig, OpenMode};
use podsearch_types::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "PODSEARCH_DATA_DIR";
pub const CONFIG_PATH_ENV: &str = "PODSEARCH_CONFIG";
pub const HF_TOKEN_ENV: &str = "HF_TOKEN";

/// Vector index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Collection dimension; the embedding dimension when unset
    #[serde(default)]
    pub dimension: Option<usize>,
    /// Open an existing index directory instead of creating one
    #[serde(default)]
    pub use_preindexed: bool,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("index")
}

fn default_collection() -> String {
    "podcast_segments".to_string()
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            collection: default_collection(),
            metric: DistanceMetric::default(),
            dimension: None,
            use_preindexed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionBackend {
    #[default]
    Whisper,
    Command,
}

/// Speech-to-text settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionSettings {
    #[serde(default)]
    pub engine: TranscriptionBackend,
    /// ggml model for the whisper engine
    #[serde(default = "default_whisper_model")]
    pub model_path: PathBuf,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_threads")]
    pub threads: i32,
    /// Program for the command engine
    #[serde(default)]
    pub command: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_whisper_model() -> PathBuf {
    PathBuf::from("models/ggml-base.bin")
}

fn default_language() -> String {
    "auto".to_string()
}

fn default_threads() -> i32 {
    4
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            engine: TranscriptionBackend::default(),
            model_path: default_whisper_model(),
            language: default_language(),
            threads: default_threads(),
            command: None,
            args: Vec::new(),
        }
    }
}

/// Speaker diarization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiarizationSettings {
    #[serde(default = "default_diarization_command")]
    pub command: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_diarization_command() -> PathBuf {
    PathBuf::from("podsearch-diarize")
}

impl Default for DiarizationSettings {
    fn default() -> Self {
        Self {
            command: default_diarization_command(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Onnx,
    Ollama,
}

/// Text embedding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub provider: EmbeddingProvider,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    /// ONNX model file
    #[serde(default = "default_onnx_model")]
    pub model_path: PathBuf,
    /// HuggingFace tokenizer.json for the ONNX model
    #[serde(default = "default_tokenizer")]
    pub tokenizer_path: PathBuf,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_true")]
    pub use_token_type_ids: bool,
    /// Ollama model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_onnx_model() -> PathBuf {
    PathBuf::from("models/all-MiniLM-L6-v2/model.onnx")
}

fn default_tokenizer() -> PathBuf {
    PathBuf::from("models/all-MiniLM-L6-v2/tokenizer.json")
}

fn default_max_tokens() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_ollama_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            dimension: default_embedding_dimension(),
            model_path: default_onnx_model(),
            tokenizer_path: default_tokenizer(),
            max_tokens: default_max_tokens(),
            use_token_type_ids: true,
            model: default_ollama_model(),
            url: default_ollama_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// What happens to an episode's existing entries when it is ingested again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReingestPolicy {
    /// Overwrite entries position by position; trailing entries of a longer
    /// earlier run are left in place
    #[default]
    Overwrite,
    /// Remove every entry of the episode before writing
    Replace,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSettings {
    #[serde(default)]
    pub reingest_policy: ReingestPolicy,
}

/// Full settings file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub transcription: TranscriptionSettings,
    #[serde(default)]
    pub diarization: DiarizationSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
    /// Where uploads are staged as `temp_{episodeId}.{ext}`
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    #[serde(default = "default_snippets_dir")]
    pub snippets_dir: PathBuf,
    /// From `HF_TOKEN`, never written to disk
    #[serde(skip)]
    pub hf_token: Option<String>,
    #[serde(skip)]
    pub data_dir: PathBuf,
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_snippets_dir() -> PathBuf {
    PathBuf::from("snippets")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index: IndexSettings::default(),
            transcription: TranscriptionSettings::default(),
            diarization: DiarizationSettings::default(),
            embedding: EmbeddingSettings::default(),
            ingest: IngestSettings::default(),
            uploads_dir: default_uploads_dir(),
            snippets_dir: default_snippets_dir(),
            hf_token: None,
            data_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Default data directory, `PODSEARCH_DATA_DIR` when set
    pub fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        dirs::data_local_dir()
            .map(|p| p.join("podsearch"))
            .unwrap_or_else(|| PathBuf::from(".podsearch"))
    }

    /// Load settings using the environment for paths and the HF token
    pub fn load() -> Self {
        let data_dir = Self::default_data_dir();
        let config_path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("config.json"));

        let mut settings = Self::load_from(&config_path, &data_dir);
        settings.hf_token = std::env::var(HF_TOKEN_ENV).ok().filter(|t| !t.is_empty());
        settings
    }

    /// Load settings from `path`; a missing or invalid file gives defaults
    pub fn load_from(path: &Path, data_dir: &Path) -> Self {
        let mut settings = if !path.exists() {
            tracing::info!("Settings file {:?} not found, using defaults", path);
            Self::default()
        } else {
            match Self::read_file(path) {
                Ok(settings) => {
                    tracing::info!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    tracing::warn!("Ignoring settings file {:?}: {:#}", path, e);
                    Self::default()
                }
            }
        };
        settings.data_dir = data_dir.to_path_buf();
        settings
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        serde_json::from_str(&content).context("Failed to parse settings file")
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create settings directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).context("Failed to write settings file")?;
        tracing::info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Resolve a configured path against the data directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn index_dir(&self) -> PathBuf {
        self.resolve(&self.index.path)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.resolve(&self.uploads_dir)
    }

    pub fn snippets_dir(&self) -> PathBuf {
        self.resolve(&self.snippets_dir)
    }

    /// Open an existing index only when a pre-built one is configured and present
    pub fn index_open_mode(&self) -> OpenMode {
        if self.index.use_preindexed && self.index_dir().exists() {
            OpenMode::Existing
        } else {
            OpenMode::CreateIfMissing
        }
    }

    pub fn collection_config(&self, embedding_dimension: usize) -> CollectionConfig {
        CollectionConfig {
            name: self.index.collection.clone(),
            dimension: self.index.dimension.unwrap_or(embedding_dimension),
            metric: self.index.metric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.json"), dir.path());

        assert_eq!(settings.index.collection, "podcast_segments");
        assert_eq!(settings.embedding.dimension, 384);
        assert_eq!(settings.ingest.reingest_policy, ReingestPolicy::Overwrite);
        assert_eq!(settings.index_dir(), dir.path().join("index"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "index": {"collection": "shows", "metric": "l2", "usePreindexed": true},
                "embedding": {"provider": "ollama", "dimension": 768},
                "ingest": {"reingestPolicy": "replace"},
                "snippetsDir": "/tmp/clips"
            }"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path, dir.path());
        assert_eq!(settings.index.collection, "shows");
        assert_eq!(settings.index.metric, DistanceMetric::L2);
        assert!(settings.index.use_preindexed);
        assert_eq!(settings.embedding.provider, EmbeddingProvider::Ollama);
        assert_eq!(settings.embedding.max_tokens, 256);
        assert_eq!(settings.ingest.reingest_policy, ReingestPolicy::Replace);
        assert_eq!(settings.snippets_dir(), PathBuf::from("/tmp/clips"));
        assert_eq!(settings.transcription.language, "auto");
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let settings = Settings::load_from(&path, dir.path());
        assert_eq!(settings.index.collection, "podcast_segments");
    }

    #[test]
    fn test_open_mode_follows_preindexed_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::load_from(&dir.path().join("none.json"), dir.path());
        assert_eq!(settings.index_open_mode(), OpenMode::CreateIfMissing);

        settings.index.use_preindexed = true;
        assert_eq!(settings.index_open_mode(), OpenMode::CreateIfMissing);

        std::fs::create_dir_all(settings.index_dir()).unwrap();
        assert_eq!(settings.index_open_mode(), OpenMode::Existing);
    }

    #[test]
    fn test_collection_dimension_override() {
        let mut settings = Settings::default();
        assert_eq!(settings.collection_config(384).dimension, 384);

        settings.index.dimension = Some(768);
        assert_eq!(settings.collection_config(384).dimension, 768);
    }

    #[test]
    fn test_save_round_trip_skips_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut settings = Settings::default();
        settings.hf_token = Some("hf_secret".to_string());
        settings.index.collection = "saved".to_string();
        settings.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("hf_secret"));
        assert_eq!(Settings::load_from(&path, dir.path()).index.collection, "saved");
    }
}
