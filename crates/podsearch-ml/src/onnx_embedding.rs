//! Sentence embeddings with an ONNX transformer model
//!
//! Works with sentence-transformers exports (e.g. all-MiniLM-L6-v2): the text
//! is tokenized with a HuggingFace `tokenizer.json`, token vectors are
//! mean-pooled over the attention mask and the result is L2-normalized.
//! Models that already output `sentence_embedding` are used without pooling.

use crate::traits::EmbeddingEngine;
use crate::vector::{mean_pool, normalize_vector};
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use parking_lot::Mutex;
use std::path::PathBuf;
use tokenizers::{Tokenizer, TruncationParams};

/// ONNX embedding configuration
#[derive(Debug, Clone)]
pub struct OnnxEmbeddingConfig {
    /// Path to model.onnx
    pub model_path: PathBuf,
    /// Path to tokenizer.json
    pub tokenizer_path: PathBuf,
    /// Output vector length
    pub dimension: usize,
    /// Longer inputs are truncated
    pub max_tokens: usize,
    /// BERT-style models take a `token_type_ids` input
    pub use_token_type_ids: bool,
}

impl Default for OnnxEmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("all-MiniLM-L6-v2/model.onnx"),
            tokenizer_path: PathBuf::from("all-MiniLM-L6-v2/tokenizer.json"),
            dimension: 384,
            max_tokens: 256,
            use_token_type_ids: true,
        }
    }
}

/// ONNX Runtime embedding engine
pub struct OnnxEmbeddingEngine {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    config: OnnxEmbeddingConfig,
}

impl OnnxEmbeddingEngine {
    pub fn new(config: OnnxEmbeddingConfig) -> Result<Self> {
        tracing::info!(
            "Loading ONNX embedding model from {:?} (dimension {})",
            config.model_path,
            config.dimension
        );

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&config.model_path)
            .context("Failed to load ONNX embedding model")?;

        let mut tokenizer = Tokenizer::from_file(&config.tokenizer_path).map_err(|e| {
            anyhow::anyhow!("Failed to load tokenizer {:?}: {}", config.tokenizer_path, e)
        })?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_tokens,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;
        tokenizer.with_padding(None);

        tracing::info!("ONNX embedding model loaded successfully");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            config,
        })
    }
}

impl EmbeddingEngine for OnnxEmbeddingEngine {
    fn name(&self) -> &str {
        "onnx"
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenize: {}", e))?;

        let ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| x as i64)
            .collect();
        let type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&x| x as i64).collect();
        let num_tokens = ids.len();

        // ort 2.x uses tuple (shape, data) for Tensor::from_array
        let ids_tensor = ort::value::Tensor::from_array(([1_i64, num_tokens as i64], ids))?;
        let mask_tensor =
            ort::value::Tensor::from_array(([1_i64, num_tokens as i64], mask.clone()))?;

        let embedding = {
            let mut session_guard = self.session.lock();

            let outputs = if self.config.use_token_type_ids {
                let type_tensor =
                    ort::value::Tensor::from_array(([1_i64, num_tokens as i64], type_ids))?;
                session_guard.run(ort::inputs![
                    "input_ids" => ids_tensor,
                    "attention_mask" => mask_tensor,
                    "token_type_ids" => type_tensor,
                ])?
            } else {
                session_guard.run(ort::inputs![
                    "input_ids" => ids_tensor,
                    "attention_mask" => mask_tensor,
                ])?
            };

            if let Some(pooled) = outputs.get("sentence_embedding") {
                let (_, data) = pooled.try_extract_tensor::<f32>()?;
                data.to_vec()
            } else {
                let output = outputs
                    .get("last_hidden_state")
                    .or_else(|| outputs.get("token_embeddings"))
                    .context("No output tensor found")?;

                let (shape, data) = output.try_extract_tensor::<f32>()?;
                let hidden_size = shape[shape.len() - 1] as usize;
                mean_pool(data, &mask, hidden_size)
            }
        };

        if embedding.len() != self.config.dimension {
            anyhow::bail!(
                "Embedding model returned {} values, expected {}",
                embedding.len(),
                self.config.dimension
            );
        }

        Ok(normalize_vector(&embedding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OnnxEmbeddingConfig::default();
        assert_eq!(config.dimension, 384);
        assert!(config.use_token_type_ids);
    }

    #[test]
    #[ignore = "requires PODSEARCH_TEST_ONNX_DIR with model.onnx and tokenizer.json"]
    fn test_embed_is_normalized() {
        let dir = PathBuf::from(std::env::var("PODSEARCH_TEST_ONNX_DIR").unwrap());
        let engine = OnnxEmbeddingEngine::new(OnnxEmbeddingConfig {
            model_path: dir.join("model.onnx"),
            tokenizer_path: dir.join("tokenizer.json"),
            ..Default::default()
        })
        .unwrap();

        let v = engine.embed("welcome back to the show").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert_eq!(v.len(), 384);
        assert!((norm - 1.0).abs() < 1e-3);
    }
}
