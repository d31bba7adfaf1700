//! Embedding functions used by the knowledge store.
//!
//! The same [`Embedder`] must be used for indexing and querying, otherwise
//! stored vectors and query vectors live in different spaces.

use std::hash::Hasher;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use rustc_hash::{FxHashSet, FxHasher};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

use crate::errors::{RagError, Result, snippet};

pub const DEFAULT_DIMENSIONS: usize = 512;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector returned by [`Embedder::embed`].
    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}

lazy_static! {
    static ref STOP_WORDS: FxHashSet<&'static str> = {
        let words = vec![
            "a", "an", "and", "are", "as", "at", "be", "by", "for", "from",
            "has", "he", "in", "is", "it", "its", "of", "on", "that", "the",
            "to", "was", "were", "will", "with"
        ];
        words.into_iter().collect()
    };
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").expect("static regex is valid");
}

/// Normalizes, lowercases and splits text into content tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let text = text.nfc().collect::<String>().to_lowercase();
    let text = NON_WORD.replace_all(&text, " ");

    text.split_whitespace()
        .filter(|&token| !STOP_WORDS.contains(token))
        .map(|token| token.to_string())
        .collect()
}

/// Offline bag-of-words embedder using signed feature hashing.
///
/// Stateless: a token always lands in the same bucket, so vectors computed
/// at seeding time stay comparable with vectors computed per query.
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    dimensions: usize,
}

impl HashedEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Config("embedding dimension must be > 0".into()));
        }
        Ok(Self { dimensions })
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let mut hasher = FxHasher::default();
        hasher.write(token.as_bytes());
        let hash = hasher.finish();
        let index = ((hash >> 32) % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
        (index, sign)
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

#[async_trait]
impl Embedder for HashedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; self.dimensions];
        for token in tokenize(text) {
            let (index, sign) = self.bucket(&token);
            vector[index] += sign;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashed"
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug)]
pub struct RemoteEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl RemoteEmbedder {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        dimensions: usize,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let base = base_url.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(RagError::Config(format!(
                "embedding endpoint must be http(s): '{base_url}'"
            )));
        }
        if dimensions == 0 {
            return Err(RagError::Config("embedding dimension must be > 0".into()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Config(format!("http client build: {e}")))?;

        let model = model.into();
        info!(endpoint = %base, model = %model, dimensions, "remote embedder initialized");

        Ok(Self {
            client,
            url: format!("{base}/embeddings"),
            model,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: text,
        };
        debug!(model = %self.model, input_len = text.len(), "POST {}", self.url);

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| RagError::StoreUnavailable(format!("POST {}: {e}", self.url)))?;

        let code = resp.status();
        if !code.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".into());
            return Err(RagError::StoreUnavailable(format!(
                "embeddings request failed ({code}): {}",
                snippet(&body, 200)
            )));
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| RagError::StoreUnavailable(format!("parse embeddings json: {e}")))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RagError::StoreUnavailable("embeddings response has no data".into()))?;

        if embedding.len() != self.dimensions {
            return Err(RagError::StoreUnavailable(format!(
                "embedding dim {} != expected {} (model: {})",
                embedding.len(),
                self.dimensions,
                self.model
            )));
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "remote"
    }
}
