//! Knowledge retrieval collaborators: a feature-hashing embedder and a
//! SQLite-backed passage store ranked by cosine similarity. Both sit
//! behind the core traits so a real embedding service or vector store
//! can replace them without touching the engine.

use anyhow::Result;
use async_trait::async_trait;
use peira_core::{Embedder, KnowledgeBase};
use peira_memory::SqliteStore;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Cosine similarity between two vectors, 0.0 for mismatched or empty
/// input rather than an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Feature-hashed bag of words: each token lands in one of `dims`
/// buckets, the vector is L2-normalized. Deterministic across runs.
pub struct HashedBowEmbedder {
    dims: usize,
}

impl HashedBowEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for HashedBowEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Embedder for HashedBowEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dims as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }
}

/// Passage store over the shared SQLite database. The corpus is scanned
/// in full and ranked per query; at this scale that is the index.
pub struct SqliteKnowledge {
    store: Arc<SqliteStore>,
}

impl SqliteKnowledge {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    /// Embed and store one passage.
    pub async fn add_document(&self, text: &str, embedder: &dyn Embedder) -> Result<i64> {
        let embedding = embedder.embed(text).await?;
        self.store.add_document(text, &embedding).await
    }
}

#[async_trait]
impl KnowledgeBase for SqliteKnowledge {
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<String>> {
        let docs = self.store.all_documents().await?;

        let mut scored: Vec<(f32, String)> = docs
            .into_iter()
            .map(|doc| (cosine_similarity(query_embedding, &doc.embedding), doc.text))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(top_k).map(|(_, text)| text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_handles_degenerate_input() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_identical_vectors_score_one() {
        let v = [0.5, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn embedder_is_deterministic_and_normalized() {
        let embedder = HashedBowEmbedder::default();
        let a = embedder.embed("rust async runtime").await.unwrap();
        let b = embedder.embed("rust async runtime").await.unwrap();
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let embedder = HashedBowEmbedder::default();
        let v = embedder.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn search_ranks_closest_passage_first() {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let embedder = HashedBowEmbedder::default();
        let kb = SqliteKnowledge::new(store);

        kb.add_document("rust borrow checker ownership", &embedder)
            .await
            .unwrap();
        kb.add_document("gardening tips tomato soil", &embedder)
            .await
            .unwrap();

        let query = embedder.embed("rust ownership").await.unwrap();
        let hits = kb.search(&query, 1).await.unwrap();
        assert_eq!(hits, vec!["rust borrow checker ownership".to_string()]);
    }

    #[tokio::test]
    async fn unrelated_query_yields_empty() {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let embedder = HashedBowEmbedder::default();
        let kb = SqliteKnowledge::new(store);
        kb.add_document("rust borrow checker", &embedder).await.unwrap();

        let query = embedder.embed("").await.unwrap();
        assert!(kb.search(&query, 5).await.unwrap().is_empty());
    }
}
