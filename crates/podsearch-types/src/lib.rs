//! Shared types for Podsearch
//!
//! This crate contains the data model shared by the ML adapters, the
//! transcript index, the pipeline services and the worker protocol.
//!
//! Wire types are annotated with `#[ts(export)]` for TypeScript generation via ts-rs.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Sentinel written for segments that no diarization turn fully contains
pub const UNKNOWN_SPEAKER: &str = "Unknown";

// ============================================================================
// Transcription & Diarization Types
// ============================================================================

/// A segment of transcribed text with timing information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionSegment {
    /// Transcribed text
    pub text: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
}

impl TranscriptionSegment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Speaker turn from diarization ("who spoke when")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DiarizationTurn {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Speaker label, only meaningful within one episode (e.g. "SPEAKER_00")
    pub speaker: String,
}

impl DiarizationTurn {
    pub fn new(start: f64, end: f64, speaker: impl Into<String>) -> Self {
        Self {
            start,
            end,
            speaker: speaker.into(),
        }
    }

    /// True when `[start, end]` lies fully inside this turn
    pub fn contains(&self, start: f64, end: f64) -> bool {
        start >= self.start && end <= self.end
    }
}

/// Speaker assigned to a transcript segment.
///
/// Serialized as a plain string; the sentinel is written as `"Unknown"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Speaker {
    Known(String),
    #[default]
    Unknown,
}

impl Speaker {
    pub fn label(&self) -> &str {
        match self {
            Self::Known(label) => label,
            Self::Unknown => UNKNOWN_SPEAKER,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl From<String> for Speaker {
    fn from(label: String) -> Self {
        if label.is_empty() || label == UNKNOWN_SPEAKER {
            Self::Unknown
        } else {
            Self::Known(label)
        }
    }
}

impl From<&str> for Speaker {
    fn from(label: &str) -> Self {
        Self::from(label.to_string())
    }
}

impl From<Speaker> for String {
    fn from(speaker: Speaker) -> Self {
        match speaker {
            Speaker::Known(label) => label,
            Speaker::Unknown => UNKNOWN_SPEAKER.to_string(),
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Transcript segment annotated with its inferred speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedSegment {
    pub text: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    #[ts(type = "string")]
    pub speaker: Speaker,
}

// ============================================================================
// Index Types
// ============================================================================

/// Distance metric of a vector collection, fixed when the collection is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    L2,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cosine" => Some(Self::Cosine),
            "l2" => Some(Self::L2),
            _ => None,
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata stored alongside each indexed segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMetadata {
    /// Episode identifier
    pub episode: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    #[ts(type = "string")]
    pub speaker: Speaker,
}

/// Build the index id for a segment: `"{episode_id}_{segment_index}"`
pub fn entry_id(episode_id: &str, segment_index: usize) -> String {
    format!("{}_{}", episode_id, segment_index)
}

/// Persisted unit of the transcript index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    /// Segment text
    pub document: String,
    pub metadata: SegmentMetadata,
}

impl IndexEntry {
    /// Build the entry for the `segment_index`-th segment of an episode
    pub fn from_segment(
        episode_id: &str,
        segment_index: usize,
        segment: EnrichedSegment,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: entry_id(episode_id, segment_index),
            embedding,
            document: segment.text,
            metadata: SegmentMetadata {
                episode: episode_id.to_string(),
                start: segment.start,
                end: segment.end,
                speaker: segment.speaker,
            },
        }
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// Segment text
    pub document: String,
    pub metadata: SegmentMetadata,
    /// Distance to the query under the collection metric (lower = closer)
    pub distance: f32,
}

/// Search results ordered by descending similarity
pub type QueryResult = Vec<SearchHit>;

/// Search hit with an optional playable snippet
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PlayableHit {
    #[serde(flatten)]
    pub hit: SearchHit,
    /// Path to the extracted audio snippet, absent when the episode audio is gone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet_path: Option<String>,
}

/// Index statistics
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub collection: String,
    pub entries: u64,
    pub dimension: u32,
    pub metric: DistanceMetric,
}

// ============================================================================
// Worker IPC Types
// ============================================================================

/// Result count when a search command omits `topK`
pub const DEFAULT_TOP_K: usize = 5;

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// Worker command for IPC
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type")]
pub enum WorkerCommand {
    /// Copy an uploaded file to the staged episode audio path
    StageUpload {
        #[serde(rename = "episodeId")]
        episode_id: String,
        extension: String,
        #[serde(rename = "sourcePath")]
        source_path: String,
    },
    /// Transcribe, diarize, align and index one episode
    Ingest {
        #[serde(rename = "audioPath")]
        audio_path: String,
        #[serde(rename = "episodeId")]
        episode_id: String,
    },
    /// Semantic search over indexed segments
    Search {
        query: String,
        #[serde(rename = "topK", default = "default_top_k")]
        top_k: usize,
        #[serde(rename = "withSnippets", default)]
        with_snippets: bool,
    },
    /// Cut `[start, end)` seconds out of an audio file
    Snippet {
        #[serde(rename = "audioPath")]
        audio_path: String,
        start: u32,
        end: u32,
    },
    /// Report index statistics
    Stats,
    /// Shutdown worker
    Shutdown,
}

/// Worker response for IPC
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type")]
pub enum WorkerResponse {
    Staged {
        #[serde(rename = "audioPath")]
        audio_path: String,
    },
    Ingested {
        #[serde(rename = "episodeId")]
        episode_id: String,
        #[serde(rename = "segmentCount")]
        segment_count: usize,
    },
    SearchResults {
        hits: Vec<PlayableHit>,
    },
    Snippet {
        path: String,
    },
    Stats(IndexStats),
    /// Error
    Error { message: String },
    /// Acknowledgement
    Ok,
}
