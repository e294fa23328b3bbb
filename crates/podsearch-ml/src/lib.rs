//! ML crate for Podsearch
//!
//! Engine traits and adapters for transcription, diarization and text
//! embedding, plus the segment-speaker aligner.

pub mod alignment;
pub mod command_asr;
pub mod diarization;
pub mod ollama_embedding;
#[cfg(feature = "onnx")]
pub mod onnx_embedding;
pub mod subprocess;
pub mod traits;
pub mod vector;
#[cfg(feature = "whisper")]
pub mod whisper;

pub use alignment::{align, find_containing_turn, speaker_stats, SpeakerStats};
pub use command_asr::CommandAsrEngine;
pub use diarization::{CommandDiarizationConfig, CommandDiarizationEngine};
pub use ollama_embedding::{OllamaEmbeddingConfig, OllamaEmbeddingEngine};
#[cfg(feature = "onnx")]
pub use onnx_embedding::{OnnxEmbeddingConfig, OnnxEmbeddingEngine};
pub use traits::{DiarizationEngine, EmbeddingEngine, TranscriptionEngine};
pub use vector::normalize_vector;
#[cfg(feature = "whisper")]
pub use whisper::WhisperEngine;
