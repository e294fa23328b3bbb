//! Pipeline errors

use podsearch_index::IndexError;
use thiserror::Error;

/// Result alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// External capability that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcription,
    Diarization,
    Embedding,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Transcription => "transcription",
            Self::Diarization => "diarization",
            Self::Embedding => "embedding",
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid episode id {0:?}: must be non-empty and contain no path separators")]
    InvalidEpisodeId(String),

    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("audio error: {0:#}")]
    Audio(anyhow::Error),

    #[error("{stage} failed: {error:#}")]
    Adapter { stage: Stage, error: anyhow::Error },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn adapter(stage: Stage) -> impl FnOnce(anyhow::Error) -> Self {
        move |error| Self::Adapter { stage, error }
    }
}

/// Episode ids name staged files, so they must be plain file-name fragments
pub fn validate_episode_id(episode_id: &str) -> Result<()> {
    let invalid = episode_id.trim().is_empty()
        || episode_id.contains(['/', '\\'])
        || episode_id == "."
        || episode_id == "..";
    if invalid {
        return Err(PipelineError::InvalidEpisodeId(episode_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_episode_id() {
        assert!(validate_episode_id("ep1").is_ok());
        assert!(validate_episode_id("show-2024_01").is_ok());
        assert!(validate_episode_id("").is_err());
        assert!(validate_episode_id("  ").is_err());
        assert!(validate_episode_id("../ep").is_err());
        assert!(validate_episode_id("a\\b").is_err());
    }

    #[test]
    fn test_adapter_error_display() {
        let err = PipelineError::adapter(Stage::Diarization)(anyhow::anyhow!("no token"));
        assert_eq!(err.to_string(), "diarization failed: no token");
    }
}
