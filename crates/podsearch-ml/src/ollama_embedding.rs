//! Embeddings from a local Ollama server (`/api/embeddings`)

use crate::traits::EmbeddingEngine;
use crate::vector::normalize_vector;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama embedding configuration
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingConfig {
    /// Embedding model name (e.g., "nomic-embed-text")
    pub model: String,
    /// Ollama API URL (e.g., "http://localhost:11434")
    pub url: String,
    /// Output vector length
    pub dimension: usize,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for OllamaEmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            url: "http://localhost:11434".to_string(),
            dimension: 768,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
    error: Option<String>,
}

/// Embedding engine backed by the Ollama HTTP API
pub struct OllamaEmbeddingEngine {
    config: OllamaEmbeddingConfig,
    client: reqwest::blocking::Client,
}

impl OllamaEmbeddingEngine {
    pub fn new(config: OllamaEmbeddingConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(
            "Ollama embeddings: model {} at {} (dimension {})",
            config.model,
            config.url,
            config.dimension
        );

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.config.url.trim_end_matches('/'))
    }

    fn parse_response(body: &str, expected_dimension: usize) -> Result<Vec<f32>> {
        let response: OllamaEmbeddingResponse =
            serde_json::from_str(body).context("Failed to parse Ollama response")?;

        if let Some(error) = response.error {
            anyhow::bail!("Ollama error: {}", error);
        }
        if response.embedding.len() != expected_dimension {
            anyhow::bail!(
                "Ollama returned {} values, expected {}",
                response.embedding.len(),
                expected_dimension
            );
        }

        Ok(normalize_vector(&response.embedding))
    }
}

impl EmbeddingEngine for OllamaEmbeddingEngine {
    fn name(&self) -> &str {
        "ollama"
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: &self.config.model,
            prompt: text,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .with_context(|| format!("Failed to reach Ollama at {}", self.config.url))?;

        let status = response.status();
        let body = response.text().context("Failed to read Ollama response")?;
        if !status.is_success() {
            anyhow::bail!("Ollama returned {}: {}", status, body);
        }

        Self::parse_response(&body, self.config.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_normalizes() {
        let v = OllamaEmbeddingEngine::parse_response(r#"{"embedding":[3.0,4.0]}"#, 2).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_parse_response_rejects_wrong_dimension() {
        let err =
            OllamaEmbeddingEngine::parse_response(r#"{"embedding":[1.0]}"#, 768).unwrap_err();
        assert!(err.to_string().contains("expected 768"));
    }

    #[test]
    fn test_parse_response_error_field() {
        let err = OllamaEmbeddingEngine::parse_response(r#"{"error":"model not found"}"#, 768)
            .unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let engine = OllamaEmbeddingEngine::new(OllamaEmbeddingConfig {
            url: "http://localhost:11434/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(engine.endpoint(), "http://localhost:11434/api/embeddings");
    }
}
