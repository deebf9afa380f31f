//! In-memory [`HybridIndex`] implementation for tests and embedding.
//!
//! Documents live in a `Vec` behind `std::sync::RwLock`. Text relevance
//! is the number of distinct query terms found in a document's content,
//! path, or declared names; vector search is brute-force cosine
//! similarity over all stored vectors.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::embedding::cosine_similarity;
use crate::models::Chunk;

use super::{
    merge_hybrid, query_terms, Candidate, HybridIndex, HybridWeights, IndexStats, SearchFilters,
    SearchHit,
};

struct StoredDocument {
    id: String,
    chunk: Chunk,
    embedding: Vec<f32>,
    indexed_at: DateTime<Utc>,
}

impl StoredDocument {
    fn hit(&self, score: f64) -> SearchHit {
        SearchHit {
            id: self.id.clone(),
            score,
            chunk: self.chunk.clone(),
            indexed_at: self.indexed_at,
        }
    }

    fn text_score(&self, terms: &[String]) -> f64 {
        let haystack = format!(
            "{} {} {} {}",
            self.chunk.content,
            self.chunk.file_path,
            self.chunk.function_name.as_deref().unwrap_or_default(),
            self.chunk.class_name.as_deref().unwrap_or_default()
        )
        .to_lowercase();
        terms.iter().filter(|t| haystack.contains(t.as_str())).count() as f64
    }
}

/// In-memory hybrid index.
pub struct InMemoryIndex {
    docs: RwLock<Vec<StoredDocument>>,
    weights: HybridWeights,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::with_weights(HybridWeights::default())
    }

    pub fn with_weights(weights: HybridWeights) -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
            weights,
        }
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn vector_candidates(docs: &[StoredDocument], vector: &[f32], k: usize, filters: &SearchFilters) -> Vec<Candidate> {
        let mut scored: Vec<Candidate> = docs
            .iter()
            .filter(|d| filters.matches(&d.chunk))
            .map(|d| Candidate {
                id: d.id.clone(),
                score: cosine_similarity(vector, &d.embedding) as f64,
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HybridIndex for InMemoryIndex {
    async fn index(&self, chunk: &Chunk, embedding: &[f32]) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.docs.write().unwrap().push(StoredDocument {
            id: id.clone(),
            chunk: chunk.clone(),
            embedding: embedding.to_vec(),
            indexed_at: Utc::now(),
        });
        Ok(id)
    }

    async fn search_vector(
        &self,
        vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let docs = self.docs.read().unwrap();
        let by_id: HashMap<&str, &StoredDocument> = docs.iter().map(|d| (d.id.as_str(), d)).collect();
        Ok(Self::vector_candidates(&docs, vector, k, filters)
            .into_iter()
            .filter_map(|c| by_id.get(c.id.as_str()).map(|d| d.hit(c.score)))
            .collect())
    }

    async fn search_hybrid(
        &self,
        text: &str,
        vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let docs = self.docs.read().unwrap();
        let terms = query_terms(text);

        let mut text_candidates: Vec<Candidate> = docs
            .iter()
            .filter(|d| filters.matches(&d.chunk))
            .map(|d| Candidate {
                id: d.id.clone(),
                score: d.text_score(&terms),
            })
            .filter(|c| c.score > 0.0)
            .collect();
        text_candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        text_candidates.truncate(k);

        let vector_candidates = Self::vector_candidates(&docs, vector, k, filters);

        let by_id: HashMap<&str, &StoredDocument> = docs.iter().map(|d| (d.id.as_str(), d)).collect();
        Ok(merge_hybrid(&text_candidates, &vector_candidates, self.weights)
            .into_iter()
            .take(k)
            .filter_map(|(id, score)| by_id.get(id.as_str()).map(|d| d.hit(score)))
            .collect())
    }

    async fn aggregate_stats(&self, repository: Option<&str>) -> Result<IndexStats> {
        let docs = self.docs.read().unwrap();
        let filters = SearchFilters::repository(repository);
        let mut stats = IndexStats::default();
        let mut files: HashSet<(&str, &str)> = HashSet::new();
        let mut by_file_type: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_chunk_type: BTreeMap<String, u64> = BTreeMap::new();

        for d in docs.iter().filter(|d| filters.matches(&d.chunk)) {
            stats.total_documents += 1;
            files.insert((d.chunk.repository.as_str(), d.chunk.file_path.as_str()));
            *by_file_type.entry(d.chunk.file_type.clone()).or_default() += 1;
            *by_chunk_type.entry(d.chunk.chunk_type.to_string()).or_default() += 1;
        }
        stats.distinct_files = files.len() as u64;
        stats.by_file_type = by_file_type;
        stats.by_chunk_type = by_chunk_type;
        Ok(stats)
    }

    async fn delete_by_filter(&self, repository: &str) -> Result<u64> {
        let mut docs = self.docs.write().unwrap();
        let before = docs.len();
        docs.retain(|d| d.chunk.repository != repository);
        Ok((before - docs.len()) as u64)
    }
}
