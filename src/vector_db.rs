use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use ndarray::Array1;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::embedding::Embedder;
use crate::errors::{RagError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub content: String,
}

impl Document {
    pub fn with_id(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredDocument {
    document: Document,
    embedding: Array1<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document: Document,
    /// Cosine similarity to the query, higher is closer.
    pub score: f32,
}

/// Results grouped per query text. Only one group is ever produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub scores: Vec<Vec<f32>>,
}

/// In-memory vector collection keyed by document id.
pub struct VectorDB {
    embedder: Arc<dyn Embedder>,
    documents: HashMap<String, StoredDocument>,
}

impl VectorDB {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        VectorDB {
            embedder,
            documents: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    /// Embeds and stores each `(id, text)` pair.
    ///
    /// Ids repeated inside the batch are rejected before anything is embedded.
    /// Ids already present in the collection are overwritten. The batch is
    /// applied only after every embedding succeeded.
    pub async fn add(&mut self, ids: &[String], texts: &[String]) -> Result<()> {
        if ids.len() != texts.len() {
            return Err(RagError::Config(format!(
                "{} ids given for {} documents",
                ids.len(),
                texts.len()
            )));
        }

        let mut seen = FxHashSet::default();
        for id in ids {
            if !seen.insert(id.as_str()) {
                return Err(RagError::DuplicateId(id.clone()));
            }
        }

        let expected = self.embedder.dimensions();
        let mut staged = Vec::with_capacity(ids.len());
        for (id, text) in ids.iter().zip(texts) {
            let embedding = self.embedder.embed(text).await?;
            if embedding.len() != expected {
                return Err(RagError::StoreUnavailable(format!(
                    "embedding for '{id}' has {} dimensions, expected {expected}",
                    embedding.len()
                )));
            }
            staged.push(StoredDocument {
                document: Document::with_id(id.clone(), text.clone()),
                embedding: Array1::from(embedding),
            });
        }

        for stored in staged {
            if self.documents.contains_key(&stored.document.id) {
                debug!(id = %stored.document.id, "overwriting existing document");
            }
            self.documents.insert(stored.document.id.clone(), stored);
        }
        Ok(())
    }

    /// Returns up to `top_k` documents ordered by descending cosine similarity.
    /// Ties are ordered by id.
    pub async fn search_similar(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(RagError::InvalidTopK);
        }

        let query_embedding = Array1::from(self.embedder.embed(query).await?);

        let mut similarities: Vec<(f32, &Document)> = self
            .documents
            .values()
            .map(|doc| {
                let similarity = cosine_similarity(&doc.embedding, &query_embedding);
                (similarity, &doc.document)
            })
            .collect();

        similarities.sort_by(|a, b| match b.0.total_cmp(&a.0) {
            Ordering::Equal => a.1.id.cmp(&b.1.id),
            other => other,
        });

        Ok(similarities
            .into_iter()
            .take(top_k)
            .map(|(score, doc)| SearchHit {
                document: doc.clone(),
                score,
            })
            .collect())
    }

    /// Single-query form of [`VectorDB::search_similar`] grouped like a
    /// multi-query index response.
    pub async fn query(&self, query_text: &str, n_results: usize) -> Result<QueryResult> {
        let hits = self.search_similar(query_text, n_results).await?;
        let mut ids = Vec::with_capacity(hits.len());
        let mut documents = Vec::with_capacity(hits.len());
        let mut scores = Vec::with_capacity(hits.len());
        for hit in hits {
            ids.push(hit.document.id);
            documents.push(hit.document.content);
            scores.push(hit.score);
        }
        Ok(QueryResult {
            ids: vec![ids],
            documents: vec![documents],
            scores: vec![scores],
        })
    }
}

fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let dot_product = a.dot(b);
    let norm_a = (a.dot(a)).sqrt();
    let norm_b = (b.dot(b)).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
