use std::sync::Arc;

use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::errors::Result;
use crate::vector_db::{Document, QueryResult, SearchHit, VectorDB};

/// Knowledge store: indexing and top-k retrieval over a [`VectorDB`].
pub struct Retriever {
    vector_db: VectorDB,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Retriever {
            vector_db: VectorDB::new(embedder),
        }
    }

    pub async fn index(&mut self, documents: Vec<Document>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let count = documents.len();
        let (ids, texts): (Vec<String>, Vec<String>) =
            documents.into_iter().map(|d| (d.id, d.content)).unzip();
        self.vector_db.add(&ids, &texts).await?;
        info!(
            added = count,
            total = self.vector_db.len(),
            embedder = self.vector_db.embedder_name(),
            "indexed documents"
        );
        Ok(())
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        // One query text in, so only the first result group matters.
        let QueryResult {
            ids,
            documents,
            scores,
        } = self.vector_db.query(query, top_k).await?;
        let hits: Vec<SearchHit> = first_group(ids)
            .into_iter()
            .zip(first_group(documents))
            .zip(first_group(scores))
            .map(|((id, content), score)| SearchHit {
                document: Document::with_id(id, content),
                score,
            })
            .collect();
        debug!(
            top_k,
            returned = hits.len(),
            ids = ?hits.iter().map(|h| h.document.id.as_str()).collect::<Vec<_>>(),
            "retrieved passages"
        );
        Ok(hits)
    }

    /// Passages only, in retrieval order.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Document>> {
        Ok(self
            .search(query, top_k)
            .await?
            .into_iter()
            .map(|hit| hit.document)
            .collect())
    }

    pub fn len(&self) -> usize {
        self.vector_db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector_db.is_empty()
    }
}

fn first_group<T>(groups: Vec<Vec<T>>) -> Vec<T> {
    groups.into_iter().next().unwrap_or_default()
}
