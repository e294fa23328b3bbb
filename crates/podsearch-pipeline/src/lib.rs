//! Podsearch pipeline
//!
//! Settings, the shared engine context, episode ingestion, semantic
//! retrieval and snippet playback for search hits.

pub mod config;
pub mod context;
pub mod error;
pub mod ingest;
pub mod playback;
pub mod retrieval;

#[cfg(test)]
mod testing;

pub use config::{ReingestPolicy, Settings};
pub use context::PipelineContext;
pub use error::{validate_episode_id, PipelineError, Result, Stage};
pub use ingest::IngestionService;
pub use playback::EpisodeAudio;
pub use retrieval::RetrievalService;
