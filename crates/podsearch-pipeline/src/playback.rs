//! Staged episode audio and snippet playback for search hits
//!
//! Uploaded audio is staged as `temp_{episodeId}.{ext}` in the uploads
//! directory. A hit whose episode audio is gone simply has no snippet.

use crate::error::{validate_episode_id, PipelineError, Result};
use podsearch_audio::{extract_slice, is_supported_extension, SUPPORTED_EXTENSIONS};
use podsearch_types::{PlayableHit, QueryResult, SearchHit};
use std::path::{Path, PathBuf};

pub struct EpisodeAudio {
    uploads_dir: PathBuf,
    snippets_dir: PathBuf,
}

impl EpisodeAudio {
    pub fn new(uploads_dir: impl Into<PathBuf>, snippets_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            snippets_dir: snippets_dir.into(),
        }
    }

    /// Deterministic staging path for an episode upload
    pub fn staged_path(&self, episode_id: &str, extension: &str) -> Result<PathBuf> {
        validate_episode_id(episode_id)?;
        let extension = extension.trim_start_matches('.').to_lowercase();
        if !is_supported_extension(&extension) {
            return Err(PipelineError::UnsupportedFormat(extension));
        }
        Ok(self
            .uploads_dir
            .join(format!("temp_{}.{}", episode_id, extension)))
    }

    /// Copy an uploaded file to its staging path.
    ///
    /// Earlier uploads of the episode under other extensions are removed so
    /// `find_audio` always returns the current file.
    pub fn stage_upload(
        &self,
        episode_id: &str,
        extension: &str,
        source: &Path,
    ) -> Result<PathBuf> {
        let target = self.staged_path(episode_id, extension)?;
        std::fs::create_dir_all(&self.uploads_dir)?;

        for ext in SUPPORTED_EXTENSIONS {
            let stale = self.uploads_dir.join(format!("temp_{}.{}", episode_id, ext));
            if stale != target && stale.exists() {
                std::fs::remove_file(&stale)?;
                tracing::debug!("Removed earlier upload {:?}", stale);
            }
        }

        let bytes = std::fs::copy(source, &target)?;
        tracing::info!("Staged {:?} as {:?} ({} bytes)", source, target, bytes);
        Ok(target)
    }

    /// Staged audio of an episode, if it still exists
    pub fn find_audio(&self, episode_id: &str) -> Option<PathBuf> {
        if validate_episode_id(episode_id).is_err() {
            return None;
        }
        SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| self.uploads_dir.join(format!("temp_{}.{}", episode_id, ext)))
            .find(|path| path.exists())
    }

    /// Cut `[start, end)` seconds out of `audio_path` into the snippets directory
    pub fn extract(&self, audio_path: &Path, start: u32, end: u32) -> Result<PathBuf> {
        extract_slice(audio_path, start, end, &self.snippets_dir).map_err(PipelineError::Audio)
    }

    /// Snippet for a hit, or `None` when the episode audio is missing.
    ///
    /// The range is widened to whole seconds.
    pub fn snippet_for(&self, hit: &SearchHit) -> Result<Option<PathBuf>> {
        let Some(audio_path) = self.find_audio(&hit.metadata.episode) else {
            tracing::debug!("No staged audio for episode {}", hit.metadata.episode);
            return Ok(None);
        };

        let (start, end) = whole_seconds(hit.metadata.start, hit.metadata.end);
        self.extract(&audio_path, start, end).map(Some)
    }

    /// Attach snippets to hits; extraction failures leave the hit without one
    pub fn with_snippets(&self, hits: QueryResult) -> Vec<PlayableHit> {
        hits.into_iter()
            .map(|hit| {
                let snippet_path = match self.snippet_for(&hit) {
                    Ok(path) => path.map(|p| p.to_string_lossy().into_owned()),
                    Err(e) => {
                        tracing::warn!(
                            "Snippet extraction failed for {} at {:.1}s: {}",
                            hit.metadata.episode,
                            hit.metadata.start,
                            e
                        );
                        None
                    }
                };
                PlayableHit { hit, snippet_path }
            })
            .collect()
    }
}

/// Floor the start and ceil the end, keeping at least one second
fn whole_seconds(start: f64, end: f64) -> (u32, u32) {
    let start = start.max(0.0).floor() as u32;
    let end = (end.max(0.0).ceil() as u32).max(start.saturating_add(1));
    (start, end)
}
