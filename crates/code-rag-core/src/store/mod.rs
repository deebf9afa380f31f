//! Hybrid index contract.
//!
//! The [`HybridIndex`] trait is everything the ingestion and retrieval
//! pipeline needs from a document index: append a chunk with its
//! embedding, run vector-only or combined text+vector search under
//! exact-match filters, aggregate counts, and delete by repository.
//!
//! Result payloads never carry the stored embedding; once indexed the
//! vector is write-only from the pipeline's point of view.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Chunk;

/// Exact-match conjunction over keyword fields. `None` means unfiltered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub repository: Option<String>,
    pub file_type: Option<String>,
}

impl SearchFilters {
    pub fn repository(repository: Option<&str>) -> Self {
        Self {
            repository: repository.map(str::to_string),
            file_type: None,
        }
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.repository
            .as_deref()
            .map_or(true, |r| chunk.repository == r)
            && self
                .file_type
                .as_deref()
                .map_or(true, |t| chunk.file_type == t)
    }
}

/// One document returned by a search, without its embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Index-assigned document id.
    pub id: String,
    /// Raw score from the index (hybrid or cosine, depending on the call).
    pub score: f64,
    pub chunk: Chunk,
    pub indexed_at: DateTime<Utc>,
}

/// Counts returned by [`HybridIndex::aggregate_stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_documents: u64,
    pub distinct_files: u64,
    pub by_file_type: BTreeMap<String, u64>,
    pub by_chunk_type: BTreeMap<String, u64>,
}

/// Fixed weighting of the two relevance signals in hybrid search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub text: f64,
    pub vector: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            text: 1.0,
            vector: 2.0,
        }
    }
}

/// A document id with a raw score from one retrieval signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub score: f64,
}

/// Abstract hybrid document index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`index`](HybridIndex::index) | Append a chunk with its embedding, returning the new id |
/// | [`search_vector`](HybridIndex::search_vector) | Cosine similarity search |
/// | [`search_hybrid`](HybridIndex::search_hybrid) | Weighted text + vector search |
/// | [`aggregate_stats`](HybridIndex::aggregate_stats) | Per-type counts and distinct files |
/// | [`delete_by_filter`](HybridIndex::delete_by_filter) | Remove a repository's documents |
#[async_trait]
pub trait HybridIndex: Send + Sync {
    /// Store a chunk and its embedding under a newly generated id.
    async fn index(&self, chunk: &Chunk, embedding: &[f32]) -> Result<String>;

    /// Top `k` documents by cosine similarity to `vector`.
    async fn search_vector(
        &self,
        vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>>;

    /// Top `k` documents matching the text or the vector (at least one),
    /// scored by the index's [`HybridWeights`].
    async fn search_hybrid(
        &self,
        text: &str,
        vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>>;

    /// Document counts, optionally restricted to one repository.
    async fn aggregate_stats(&self, repository: Option<&str>) -> Result<IndexStats>;

    /// Delete every document of `repository`, returning how many were removed.
    async fn delete_by_filter(&self, repository: &str) -> Result<u64>;
}

/// Lowercased alphanumeric terms of a free-text query, deduplicated in
/// first-seen order. Single-character terms are dropped.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in text
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
    {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(candidates: &[Candidate]) -> Vec<(&Candidate, f64)> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let s_min = candidates
        .iter()
        .map(|c| c.score)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|c| {
            let norm = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (c.score - s_min) / (s_max - s_min)
            };
            (c, norm)
        })
        .collect()
}

/// Combine text and vector candidates into hybrid scores.
///
/// Text scores are min-max normalized; vector scores are cosine
/// similarities clamped at zero. A document present in only one set gets
/// zero for the other signal. Returns `(id, score)` sorted by score
/// descending; equal scores keep first-seen order (text set first).
pub fn merge_hybrid(
    text: &[Candidate],
    vector: &[Candidate],
    weights: HybridWeights,
) -> Vec<(String, f64)> {
    let mut order: Vec<&str> = Vec::new();
    let mut scores: HashMap<&str, (f64, f64)> = HashMap::new();

    for (c, norm) in normalize_scores(text) {
        if !scores.contains_key(c.id.as_str()) {
            order.push(&c.id);
        }
        scores.entry(&c.id).or_insert((0.0, 0.0)).0 = norm;
    }
    for c in vector {
        if !scores.contains_key(c.id.as_str()) {
            order.push(&c.id);
        }
        scores.entry(&c.id).or_insert((0.0, 0.0)).1 = c.score.max(0.0);
    }

    let mut merged: Vec<(String, f64)> = order
        .into_iter()
        .map(|id| {
            let (t, v) = scores[id];
            (id.to_string(), weights.text * t + weights.vector * v)
        })
        .collect();
    merged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    merged
}
