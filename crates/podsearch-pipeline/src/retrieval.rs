//! Semantic search over indexed segments

use crate::context::PipelineContext;
use crate::error::{PipelineError, Result, Stage};
use podsearch_index::TranscriptIndex;
use podsearch_ml::EmbeddingEngine;
use podsearch_types::QueryResult;
use std::sync::Arc;

pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingEngine>,
    index: Arc<TranscriptIndex>,
}

impl RetrievalService {
    pub fn new(ctx: &PipelineContext) -> Self {
        Self {
            embedder: ctx.embedder.clone(),
            index: ctx.index.clone(),
        }
    }

    /// Top `top_k` segments for `query`, most similar first
    pub fn search(&self, query: &str, top_k: usize) -> Result<QueryResult> {
        if top_k == 0 {
            return Err(PipelineError::InvalidTopK);
        }

        let embedding = self
            .embedder
            .embed(query)
            .map_err(PipelineError::adapter(Stage::Embedding))?;
        let hits = self.index.query(&embedding, top_k)?;

        tracing::debug!("Search {:?} (top {}): {} hits", query, top_k, hits.len());
        Ok(hits)
    }
}
