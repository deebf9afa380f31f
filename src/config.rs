//! Configuration parsing and validation.
//!
//! code-rag is configured via a TOML file (default: `config/crag.toml`).
//! Every section except `[db]` is optional and falls back to defaults.
//!
//! # Example Configuration
//!
//! ```toml
//! [db]
//! path = "./data/crag.sqlite"
//!
//! [retrieval]
//! candidate_k = 15
//! final_limit = 8
//! relevance_floor = 0.3
//! intent_boost = 1.5
//!
//! [ingest]
//! batch_size = 8
//! exclude_globs = ["**/fixtures/**"]
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [generator]
//! provider = "openai"
//! model = "gpt-4o-mini"
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```
//!
//! Validation runs in [`load_config`]; an invalid file is rejected before
//! any work starts.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use code_rag_core::search::RankingParams;
use code_rag_core::store::HybridWeights;

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file. Created if missing.
    pub path: PathBuf,
}

/// Retrieval, ranking, and query limits.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    #[serde(default = "default_relevance_floor")]
    pub relevance_floor: f64,
    #[serde(default = "default_intent_boost")]
    pub intent_boost: f64,
    #[serde(default = "default_text_weight")]
    pub text_weight: f64,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
    /// Past interactions rendered into the prompt.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_candidate_k() -> usize {
    15
}
fn default_final_limit() -> usize {
    8
}
fn default_relevance_floor() -> f64 {
    0.3
}
fn default_intent_boost() -> f64 {
    1.5
}
fn default_text_weight() -> f64 {
    1.0
}
fn default_vector_weight() -> f64 {
    2.0
}
fn default_max_query_chars() -> usize {
    2000
}
fn default_history_limit() -> usize {
    10
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_k: default_candidate_k(),
            final_limit: default_final_limit(),
            relevance_floor: default_relevance_floor(),
            intent_boost: default_intent_boost(),
            text_weight: default_text_weight(),
            vector_weight: default_vector_weight(),
            max_query_chars: default_max_query_chars(),
            history_limit: default_history_limit(),
        }
    }
}

impl RetrievalConfig {
    pub fn ranking_params(&self) -> RankingParams {
        RankingParams {
            candidate_k: self.candidate_k,
            final_limit: self.final_limit,
            relevance_floor: self.relevance_floor,
            intent_boost: self.intent_boost,
        }
    }

    pub fn hybrid_weights(&self) -> HybridWeights {
        HybridWeights {
            text: self.text_weight,
            vector: self.vector_weight,
        }
    }
}

/// What happens to a repository's existing documents on re-ingestion.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReingestPolicy {
    /// Delete all documents of the repository, then insert the new set.
    #[default]
    Replace,
    /// Keep old documents; new ones are appended alongside.
    Append,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Chunks embedded and indexed concurrently per batch (5..=10).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Files larger than this are skipped with a warning.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Extra ignore globs applied on top of the repository's own rules.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Where git sources are cloned.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Clone with `--depth 1`.
    #[serde(default = "default_shallow")]
    pub shallow: bool,
    #[serde(default)]
    pub reingest: ReingestPolicy,
}

fn default_batch_size() -> usize {
    8
}
fn default_max_file_bytes() -> u64 {
    1024 * 1024
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/.git-cache")
}
fn default_shallow() -> bool {
    true
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_file_bytes: default_max_file_bytes(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            cache_dir: default_cache_dir(),
            shallow: default_shallow(),
            reingest: ReingestPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama default: `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            timeout_secs: default_generator_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl GeneratorConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_generator_timeout_secs() -> u64 {
    120
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let r = &config.retrieval;
    if r.candidate_k < 1 {
        bail!("retrieval.candidate_k must be >= 1");
    }
    if r.final_limit < 1 {
        bail!("retrieval.final_limit must be >= 1");
    }
    if !(0.0..1.0).contains(&r.relevance_floor) {
        bail!("retrieval.relevance_floor must be in [0.0, 1.0)");
    }
    if r.intent_boost < 1.0 {
        bail!("retrieval.intent_boost must be >= 1.0");
    }
    if r.text_weight < 0.0 || r.vector_weight < 0.0 {
        bail!("retrieval.text_weight and retrieval.vector_weight must be >= 0");
    }
    if r.max_query_chars < 1 {
        bail!("retrieval.max_query_chars must be >= 1");
    }

    if !(5..=10).contains(&config.ingest.batch_size) {
        bail!(code_rag_core::ValidationError::InvalidBatchSize(
            config.ingest.batch_size
        ));
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.generator.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown generator provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.generator.is_enabled() && config.generator.model.is_none() {
        bail!(
            "generator.model must be specified when provider is '{}'",
            config.generator.provider
        );
    }

    Ok(())
}
