//! Retrieval and intent-aware re-ranking.
//!
//! # Algorithm
//!
//! 1. Hybrid search for `candidate_k` candidates, optionally filtered by
//!    repository.
//! 2. Detect query intents by substring match on the lowercased query.
//!    Each detected intent whose structural signal matches a candidate
//!    multiplies its score by `intent_boost`; boosts compose.
//! 3. Drop candidates whose adjusted score is at or below
//!    `relevance_floor`.
//! 4. Stable sort by adjusted score (desc). Equal scores keep candidate
//!    order.
//! 5. Truncate to `final_limit`.

use anyhow::Result;
use serde::Serialize;

use crate::models::{Chunk, ChunkType};
use crate::store::{HybridIndex, SearchFilters, SearchHit};

/// Ranking tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingParams {
    /// Candidates requested from the hybrid index.
    pub candidate_k: usize,
    /// Maximum ranked chunks returned.
    pub final_limit: usize,
    /// Exclusive lower bound on the adjusted score.
    pub relevance_floor: f64,
    /// Multiplier applied once per matching intent.
    pub intent_boost: f64,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self {
            candidate_k: 15,
            final_limit: 8,
            relevance_floor: 0.3,
            intent_boost: 1.5,
        }
    }
}

/// A retrieved chunk with its raw and intent-adjusted scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedChunk {
    pub id: String,
    pub chunk: Chunk,
    pub raw_score: f64,
    pub adjusted_score: f64,
}

/// A category of question with a known structural signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Setup,
    Api,
    Database,
    Auth,
}

const MANIFEST_FILES: &[&str] = &[
    "package.json",
    "cargo.toml",
    "requirements.txt",
    "pyproject.toml",
    "setup.py",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "composer.json",
    "gemfile",
    "dockerfile",
    "docker-compose.yml",
    "makefile",
];

impl Intent {
    pub const ALL: [Intent; 4] = [Intent::Setup, Intent::Api, Intent::Database, Intent::Auth];

    /// Query keywords that trigger this intent.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Intent::Setup => &["setup", "set up", "install", "configure"],
            Intent::Api => &["api", "endpoint", "route"],
            Intent::Database => &["database", "model", "schema"],
            Intent::Auth => &["auth", "login", "user"],
        }
    }

    /// Whether a chunk carries this intent's structural signal.
    pub fn matches(&self, chunk: &Chunk) -> bool {
        let path = chunk.file_path.to_lowercase();
        match self {
            Intent::Setup => {
                let name = chunk.file_name.to_lowercase();
                MANIFEST_FILES.contains(&name.as_str())
                    || name.starts_with("readme")
                    || chunk.chunk_type == ChunkType::Documentation
            }
            Intent::Api => {
                path.contains("route")
                    || path.contains("controller")
                    || path.starts_with("api/")
                    || path.contains("/api/")
                    || chunk.chunk_type == ChunkType::Route
            }
            Intent::Database => {
                path.contains("model")
                    || path.contains("schema")
                    || chunk.chunk_type == ChunkType::Class
            }
            Intent::Auth => path.contains("auth") || chunk.content.to_lowercase().contains("auth"),
        }
    }
}

/// Intents whose keywords occur in the query, in [`Intent::ALL`] order.
pub fn detect_intents(query: &str) -> Vec<Intent> {
    let query = query.to_lowercase();
    Intent::ALL
        .into_iter()
        .filter(|intent| intent.keywords().iter().any(|k| query.contains(k)))
        .collect()
}

/// Apply intent boosts, the relevance floor, ordering, and the final limit.
pub fn filter_and_rank(query: &str, candidates: Vec<SearchHit>, params: &RankingParams) -> Vec<RankedChunk> {
    let intents = detect_intents(query);

    let mut ranked: Vec<RankedChunk> = candidates
        .into_iter()
        .map(|hit| {
            let adjusted_score = intents
                .iter()
                .filter(|intent| intent.matches(&hit.chunk))
                .fold(hit.score, |score, _| score * params.intent_boost);
            RankedChunk {
                id: hit.id,
                chunk: hit.chunk,
                raw_score: hit.score,
                adjusted_score,
            }
        })
        .filter(|r| r.adjusted_score > params.relevance_floor)
        .collect();

    ranked.sort_by(|a, b| {
        b.adjusted_score
            .partial_cmp(&a.adjusted_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(params.final_limit);
    ranked
}

/// Retrieve up to `final_limit` ranked chunks for a query.
///
/// `query_vec` is the embedding of the raw query text.
pub async fn retrieve<I: HybridIndex + ?Sized>(
    index: &I,
    query: &str,
    query_vec: &[f32],
    repository: Option<&str>,
    params: &RankingParams,
) -> Result<Vec<RankedChunk>> {
    let filters = SearchFilters::repository(repository);
    let candidates = index
        .search_hybrid(query, query_vec, params.candidate_k, &filters)
        .await?;
    tracing::debug!(candidates = candidates.len(), "hybrid search returned");
    Ok(filter_and_rank(query, candidates, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn hit(id: &str, path: &str, chunk_type: ChunkType, score: f64) -> SearchHit {
        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
        SearchHit {
            id: id.to_string(),
            score,
            chunk: Chunk {
                chunk_type,
                content: format!("content of {path}"),
                file_path: path.to_string(),
                file_name,
                file_type: "javascript".to_string(),
                repository: "demo".to_string(),
                branch: "main".to_string(),
                start_line: 1,
                end_line: 10,
                function_name: None,
                class_name: None,
                description: None,
            },
            indexed_at: Utc::now(),
        }
    }

    #[test]
    fn test_detect_intents() {
        assert_eq!(detect_intents("How do I set up this project?"), vec![Intent::Setup]);
        assert_eq!(
            detect_intents("Which API route handles user login?"),
            vec![Intent::Api, Intent::Auth]
        );
        assert!(detect_intents("what does this do").is_empty());
    }

    #[test]
    fn test_setup_boost_on_manifest() {
        let params = RankingParams::default();
        let candidates = vec![
            hit("code", "src/math.js", ChunkType::Function, 1.2),
            hit("pkg", "package.json", ChunkType::Configuration, 1.0),
        ];
        let ranked = filter_and_rank("How do I set up this project?", candidates, &params);
        assert_eq!(ranked[0].id, "pkg");
        assert!((ranked[0].adjusted_score - 1.5).abs() < 1e-9);
        assert!((ranked[0].raw_score - 1.0).abs() < 1e-9);
        assert!((ranked[1].adjusted_score - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_boosts_compose() {
        let params = RankingParams::default();
        let candidates = vec![hit("r", "src/routes/auth.js", ChunkType::Route, 1.0)];
        let ranked = filter_and_rank("which api endpoint does auth?", candidates, &params);
        assert!((ranked[0].adjusted_score - 2.25).abs() < 1e-9);
    }

    #[test]
    fn test_floor_is_exclusive() {
        let params = RankingParams::default();
        let candidates = vec![
            hit("at", "a.js", ChunkType::Function, 0.3),
            hit("above", "b.js", ChunkType::Function, 0.3000001),
        ];
        let ranked = filter_and_rank("explain this", candidates, &params);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "above");
    }

    #[test]
    fn test_all_below_floor_yields_empty() {
        let params = RankingParams::default();
        let candidates: Vec<SearchHit> = (0..15)
            .map(|i| hit(&format!("c{i}"), &format!("f{i}.js"), ChunkType::Function, 0.1))
            .collect();
        assert!(filter_and_rank("explain this", candidates, &params).is_empty());
    }

    #[test]
    fn test_ties_keep_candidate_order_and_limit() {
        let params = RankingParams::default();
        let candidates: Vec<SearchHit> = (0..12)
            .map(|i| hit(&format!("c{i}"), &format!("f{i}.js"), ChunkType::Function, 0.9))
            .collect();
        let first = filter_and_rank("explain this", candidates.clone(), &params);
        let second = filter_and_rank("explain this", candidates, &params);
        assert_eq!(first, second);
        let ids: Vec<&str> = first.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c0", "c1", "c2", "c3", "c4", "c5", "c6", "c7"]);
    }

    #[tokio::test]
    async fn test_retrieve_filters_repository() {
        use crate::store::memory::InMemoryIndex;

        let index = InMemoryIndex::new();
        let mut a = hit("", "a.js", ChunkType::Function, 0.0).chunk;
        a.repository = "one".into();
        let mut b = a.clone();
        b.repository = "two".into();
        index.index(&a, &[1.0, 0.0]).await.unwrap();
        index.index(&b, &[1.0, 0.0]).await.unwrap();

        let ranked = retrieve(&index, "explain", &[1.0, 0.0], Some("two"), &RankingParams::default())
            .await
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].chunk.repository, "two");
    }
}
