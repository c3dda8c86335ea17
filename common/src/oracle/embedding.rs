//! Vector encoder oracle: `encode`, `encode_batch`, `dimensions`. Mirrors the
//! pluggable `EmbeddingInner` shape used by this codebase's retrieval-quality
//! evaluation harness, generalized to a public trait with two backends:
//! a deterministic hashed fallback (no external calls, stable across
//! restarts) and an OpenAI-backed one.

use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::AppError;
use crate::utils::config::{AppConfig, EmbedBackend};

/// Maximum tokens (approximated by whitespace-split word count) a single
/// `encode_batch` request packs into one oracle call before sub-batching.
pub const MAX_BATCH_TOKEN_BUDGET: usize = 250_000;

#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, AppError>;

    /// Preserves input order in the output; splits into sub-batches bounded
    /// by `MAX_BATCH_TOKEN_BUDGET` when the oracle is rate-bounded.
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError>;

    fn dimensions(&self) -> usize;
}

#[derive(Clone, Debug)]
pub struct EmbeddingOracleConfig {
    pub backend: EmbedBackend,
    pub local_dimension: usize,
    pub openai_model: String,
}

impl EmbeddingOracleConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            backend: config.embed_backend.clone(),
            local_dimension: 384,
            openai_model: config.openai_embed_model.clone(),
        }
    }
}

/// Builds the configured backend: `EmbedBackend::Openai` needs a client,
/// falling back to the hashed oracle if none was supplied.
pub fn build_embedding_oracle(
    config: &EmbeddingOracleConfig,
    client: Option<Arc<Client<OpenAIConfig>>>,
) -> Arc<dyn EmbeddingOracle> {
    match (&config.backend, client) {
        (EmbedBackend::Openai, Some(client)) => Arc::new(OpenAiEmbeddingOracle::new(
            client,
            config.openai_model.clone(),
            config.local_dimension,
        )),
        _ => Arc::new(HashedEmbeddingOracle::new(config.local_dimension)),
    }
}

/// Deterministic fallback: no oracle call, stable hash-derived vector. Used
/// both as the default local backend and as the "opt-out" mode so ingestion
/// succeeds without a real embedding model (retrieval then falls back to
/// lexical+recency only).
pub struct HashedEmbeddingOracle {
    dimension: usize,
}

impl HashedEmbeddingOracle {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingOracle for HashedEmbeddingOracle {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, AppError> {
        Ok(hashed_embedding(text, self.dimension))
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        Ok(texts
            .iter()
            .map(|t| hashed_embedding(t, self.dimension))
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}

fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    let mut seed = text.as_bytes().to_vec();
    let mut counter: u32 = 0;
    while (counter as usize) * 32 < dimension * 4 {
        let mut hasher = Sha256::new();
        hasher.update(&seed);
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();
        for (chunk_idx, chunk) in digest.chunks(4).enumerate() {
            let idx = (counter as usize) * 8 + chunk_idx;
            if idx >= dimension {
                break;
            }
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(chunk);
            let as_u32 = u32::from_le_bytes(bytes);
            vector[idx] = (as_u32 as f32 / u32::MAX as f32) * 2.0 - 1.0;
        }
        counter += 1;
        seed = digest.to_vec();
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

pub struct OpenAiEmbeddingOracle {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddingOracle {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingOracle for OpenAiEmbeddingOracle {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let mut vectors = self.encode_batch(std::slice::from_ref(&text.to_string())).await?;
        vectors.pop().ok_or_else(|| AppError::LLMParsing("no embedding returned".into()))
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut out = Vec::with_capacity(texts.len());
        for sub_batch in sub_batches(texts) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(sub_batch.to_vec())
                .build()?;
            let response = self.client.embeddings().create(request).await?;
            out.extend(response.data.into_iter().map(|d| d.embedding));
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}

/// Splits `texts` into sub-batches respecting `MAX_BATCH_TOKEN_BUDGET`,
/// approximating token count by whitespace-split word count, preserving
/// input order.
fn sub_batches(texts: &[String]) -> Vec<&[String]> {
    let mut batches = Vec::new();
    let mut start = 0;
    let mut budget_used = 0usize;
    for (idx, text) in texts.iter().enumerate() {
        let words = text.split_whitespace().count().max(1);
        if budget_used + words > MAX_BATCH_TOKEN_BUDGET && idx > start {
            batches.push(&texts[start..idx]);
            start = idx;
            budget_used = 0;
        }
        budget_used += words;
    }
    if start < texts.len() {
        batches.push(&texts[start..]);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashed_embedding_is_deterministic() {
        let oracle = HashedEmbeddingOracle::new(32);
        let a = oracle.encode("hello world").await.unwrap();
        let b = oracle.encode("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[tokio::test]
    async fn hashed_embedding_differs_for_different_text() {
        let oracle = HashedEmbeddingOracle::new(32);
        let a = oracle.encode("alpha").await.unwrap();
        let b = oracle.encode("beta").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn encode_batch_preserves_order() {
        let oracle = HashedEmbeddingOracle::new(16);
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let batch = oracle.encode_batch(&texts).await.unwrap();
        for (text, vector) in texts.iter().zip(batch.iter()) {
            let single = oracle.encode(text).await.unwrap();
            assert_eq!(&single, vector);
        }
    }

    #[test]
    fn sub_batches_splits_on_budget() {
        let texts: Vec<String> = (0..3).map(|_| "word ".repeat(MAX_BATCH_TOKEN_BUDGET)).collect();
        let batches = sub_batches(&texts);
        assert_eq!(batches.len(), 3);
    }
}
