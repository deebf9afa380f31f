//! End-to-end ingestion and retrieval against the in-memory stores.
//!
//! Embedders here are deterministic: vectors are keyword counts over a
//! small vocabulary, so rankings are reproducible without a model.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use code_rag::answer::answer;
use code_rag::config::{parse_config, Config};
use code_rag::extract::extract_repository;
use code_rag::ingest::{index_batch, run_ingestion, IndexReport};
use code_rag::queue::{wait_for_job, IngestRequest, JobQueue};
use code_rag::services::Services;
use code_rag_core::context::NO_CONTEXT;
use code_rag_core::embedding::EmbeddingProvider;
use code_rag_core::generate::Generator;
use code_rag_core::jobs::{InMemoryJobStore, JobStore};
use code_rag_core::models::{Chunk, ChunkType, JobRecord, JobStatus};
use code_rag_core::search::retrieve;
use code_rag_core::session::{InMemorySessionStore, SessionStore};
use code_rag_core::store::memory::InMemoryIndex;
use code_rag_core::store::{HybridIndex, SearchFilters};
use code_rag_core::ValidationError;

const VOCAB: &[&str] = &[
    "project", "setup", "install", "login", "password", "cart", "price", "total",
];

struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }
    fn dims(&self) -> usize {
        VOCAB.len()
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(VOCAB
            .iter()
            .map(|word| text.matches(word).count() as f32)
            .collect())
    }
}

/// Fails for documentation chunks under `docs/`.
struct FlakyEmbedder;

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    fn model_name(&self) -> &str {
        "flaky"
    }
    fn dims(&self) -> usize {
        VOCAB.len()
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("File: docs/") && text.contains("Type: documentation") {
            bail!("429 Too Many Requests");
        }
        KeywordEmbedder.embed(text).await
    }
}

struct UnavailableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnavailableEmbedder {
    fn model_name(&self) -> &str {
        "unavailable"
    }
    fn dims(&self) -> usize {
        VOCAB.len()
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("connection refused")
    }
}

/// Records every prompt and answers with a fixed string.
#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("Call login() in src/auth.js.".to_string())
    }
}

struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("generator timed out")
    }
}

fn test_config(batch_size: usize) -> Config {
    parse_config(&format!(
        "[db]\npath = \"unused.sqlite\"\n\n[ingest]\nbatch_size = {batch_size}\n"
    ))
    .unwrap()
}

struct Harness {
    services: Services,
    index: Arc<InMemoryIndex>,
    generator: Arc<RecordingGenerator>,
}

fn harness(batch_size: usize, embedder: Arc<dyn EmbeddingProvider>) -> Harness {
    let index = Arc::new(InMemoryIndex::new());
    let generator = Arc::new(RecordingGenerator::default());
    let services = Services::new(
        test_config(batch_size),
        index.clone(),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(InMemoryJobStore::new()),
        embedder,
        generator.clone(),
    );
    Harness {
        services,
        index,
        generator,
    }
}

const LOGIN_JS: &str = "function login(username, password) {
  if (!username || !password) {
    return { ok: false, error: 'missing credentials' };
  }
  const user = findUser(username);
  if (!user) {
    return { ok: false, error: 'unknown user' };
  }
  const hash = hashPassword(password, user.salt);
  if (hash !== user.passwordHash) {
    return { ok: false, error: 'bad password' };
  }
  const token = createToken(user.id);
  audit('login', user.id);
  return {
    ok: true,
    token,
    expiresIn: 3600,
  };
}
";

fn write_fixture(root: &Path) {
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/auth.js"), LOGIN_JS).unwrap();
    fs::write(
        root.join("README.md"),
        "# Project\nA demo shop.\n\n# Setup\nRun npm install, then npm start.\n",
    )
    .unwrap();
}

fn job_for(root: &Path, repository: &str) -> JobRecord {
    JobRecord::pending(repository, "main", root.to_string_lossy().to_string())
}

#[test]
fn test_ingest_fixture_repository_chunks() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());

    let report = extract_repository(tmp.path(), "shop", "main", &test_config(8).ingest).unwrap();
    assert_eq!(report.files_processed, 2);
    assert_eq!(report.files_skipped, 0);

    let overviews: Vec<&Chunk> = report
        .chunks
        .iter()
        .filter(|c| c.chunk_type == ChunkType::FileOverview)
        .collect();
    assert_eq!(overviews.len(), 2);

    let login = report
        .chunks
        .iter()
        .find(|c| c.chunk_type == ChunkType::Function && c.function_name.as_deref() == Some("login"))
        .expect("login function chunk");
    assert_eq!((login.start_line, login.end_line), (1, 20));

    let docs = report
        .chunks
        .iter()
        .filter(|c| c.chunk_type == ChunkType::Documentation)
        .count();
    assert_eq!(docs, 2);

    for chunk in &report.chunks {
        assert!(chunk.start_line >= 1);
        assert!(chunk.end_line >= chunk.start_line);
    }
}

#[tokio::test]
async fn test_run_ingestion_completes_and_indexes_everything() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let h = harness(8, Arc::new(KeywordEmbedder));

    let job = run_ingestion(&h.services, job_for(tmp.path(), "shop")).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.message, "indexed 5 of 5 chunks from 2 files (0 skipped)");
    assert_eq!(h.index.len(), 5);

    let stored = h.services.jobs.get(&job.id).await.unwrap().unwrap();
    assert_eq!(stored, job);

    let stats = h.index.aggregate_stats(Some("shop")).await.unwrap();
    assert_eq!(stats.total_documents, 5);
    assert_eq!(stats.distinct_files, 2);
    assert_eq!(stats.by_chunk_type.get("file_overview"), Some(&2));
    assert_eq!(stats.by_chunk_type.get("documentation"), Some(&2));
    assert_eq!(stats.by_file_type.get("markdown"), Some(&3));
}

#[tokio::test]
async fn test_setup_question_boosts_manifest_configuration() {
    let h = harness(8, Arc::new(KeywordEmbedder));
    let embedder = KeywordEmbedder;

    let make = |chunk_type, path: &str, content: &str, name: Option<&str>| Chunk {
        chunk_type,
        content: content.to_string(),
        file_path: path.to_string(),
        file_name: path.rsplit('/').next().unwrap().to_string(),
        file_type: if path.ends_with(".json") { "json" } else { "javascript" }.to_string(),
        repository: "shop".to_string(),
        branch: "main".to_string(),
        start_line: 1,
        end_line: 3,
        function_name: name.map(str::to_string),
        class_name: None,
        description: None,
    };
    let chunks = vec![
        make(
            ChunkType::Function,
            "src/cart.js",
            "function total(items) {\n  return items.reduce((a, b) => a + b.price, 0);\n}",
            Some("total"),
        ),
        make(
            ChunkType::Configuration,
            "package.json",
            "{\n  \"name\": \"demo-project\",\n  \"scripts\": {\n    \"setup\": \"npm install\"\n  }\n}",
            None,
        ),
        make(
            ChunkType::Function,
            "src/price.js",
            "function price(item) {\n  return item.cents / 100;\n}",
            Some("price"),
        ),
    ];
    for chunk in &chunks {
        let vector = embedder
            .embed(&code_rag_core::embedding::prepare_chunk_text(chunk))
            .await
            .unwrap();
        h.index.index(chunk, &vector).await.unwrap();
    }

    let query = "How do I set up this project?";
    let query_vec = embedder.embed(query).await.unwrap();
    let params = h.services.config.retrieval.ranking_params();
    let ranked = retrieve(h.index.as_ref(), query, &query_vec, Some("shop"), &params)
        .await
        .unwrap();

    let top = &ranked[0];
    assert_eq!(top.chunk.file_name, "package.json");
    assert!(top.raw_score > 0.0);
    assert!((top.adjusted_score - top.raw_score * 1.5).abs() < 1e-9);
    assert!(ranked.iter().all(|r| r.adjusted_score > params.relevance_floor));
}

#[tokio::test]
async fn test_reingestion_replaces_documents() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let h = harness(8, Arc::new(KeywordEmbedder));

    let first = run_ingestion(&h.services, job_for(tmp.path(), "shop")).await;
    assert_eq!(first.status, JobStatus::Completed);
    let after_first = h.index.len();

    let second = run_ingestion(&h.services, job_for(tmp.path(), "shop")).await;
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(h.index.len(), after_first);

    let single =
        extract_repository(tmp.path(), "shop", "main", &h.services.config.ingest).unwrap();
    assert_eq!(h.index.len(), single.chunks.len());
}

#[tokio::test]
async fn test_reingestion_leaves_other_repositories() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let h = harness(8, Arc::new(KeywordEmbedder));

    run_ingestion(&h.services, job_for(tmp.path(), "shop")).await;
    run_ingestion(&h.services, job_for(tmp.path(), "shop-fork")).await;
    run_ingestion(&h.services, job_for(tmp.path(), "shop")).await;

    let shop = h.index.aggregate_stats(Some("shop")).await.unwrap();
    let fork = h.index.aggregate_stats(Some("shop-fork")).await.unwrap();
    assert_eq!(shop.total_documents, 5);
    assert_eq!(fork.total_documents, 5);
}

#[tokio::test]
async fn test_replace_with_embedder_down_completes_with_nothing_indexed() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let h = harness(8, Arc::new(KeywordEmbedder));
    run_ingestion(&h.services, job_for(tmp.path(), "shop")).await;
    assert_eq!(h.index.len(), 5);

    let outage = Services::new(
        test_config(8),
        h.index.clone(),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(InMemoryJobStore::new()),
        Arc::new(UnavailableEmbedder),
        h.generator.clone(),
    );
    let job = run_ingestion(&outage, job_for(tmp.path(), "shop")).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.message, "indexed 0 of 5 chunks from 2 files (0 skipped)");
    assert_eq!(h.index.len(), 0);
}

fn write_markdown_set(root: &Path) {
    for dir in ["docs", "notes"] {
        fs::create_dir_all(root.join(dir)).unwrap();
    }
    for path in ["docs/a.md", "docs/b.md", "docs/c.md", "notes/d.md", "notes/e.md"] {
        fs::write(root.join(path), format!("# Title {path}\nBody text for {path}.\n")).unwrap();
    }
}

#[tokio::test]
async fn test_batch_with_three_failures_still_completes() {
    let tmp = TempDir::new().unwrap();
    write_markdown_set(tmp.path());
    let h = harness(10, Arc::new(FlakyEmbedder));

    let job = run_ingestion(&h.services, job_for(tmp.path(), "notes")).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.message, "indexed 7 of 10 chunks from 5 files (0 skipped)");
    assert_eq!(h.index.len(), 7);
}

#[tokio::test]
async fn test_index_batch_reports_partial_failure() {
    let tmp = TempDir::new().unwrap();
    write_markdown_set(tmp.path());
    let report = extract_repository(tmp.path(), "notes", "main", &test_config(10).ingest).unwrap();
    assert_eq!(report.chunks.len(), 10);

    let index = InMemoryIndex::new();
    let result = index_batch(&index, &FlakyEmbedder, &report.chunks).await;
    assert_eq!(
        result,
        IndexReport {
            succeeded: 7,
            failed: 3
        }
    );
}

#[tokio::test]
async fn test_missing_source_fails_job() {
    let h = harness(8, Arc::new(KeywordEmbedder));
    let job = JobRecord::pending("ghost", "main", "/definitely/not/here");

    let job = run_ingestion(&h.services, job).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.message.contains("failed to fetch source"));
    assert!(h.index.is_empty());
}

#[tokio::test]
async fn test_queue_runs_submitted_job() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let h = harness(8, Arc::new(KeywordEmbedder));
    let queue = JobQueue::start(h.services.clone());

    let job_id = queue
        .submit(IngestRequest {
            source: tmp.path().to_string_lossy().to_string(),
            repository: "shop".into(),
            branch: "main".into(),
        })
        .await
        .unwrap();

    let mut seen = Vec::new();
    let job = wait_for_job(
        h.services.jobs.as_ref(),
        &job_id,
        Duration::from_millis(10),
        |job| seen.push(job.message.clone()),
    )
    .await
    .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(seen.last().map(String::as_str), Some(job.message.as_str()));
    assert_eq!(h.index.len(), 5);
}

#[tokio::test]
async fn test_queue_rejects_missing_repository() {
    let h = harness(8, Arc::new(KeywordEmbedder));
    let queue = JobQueue::start(h.services.clone());

    let err = queue
        .submit(IngestRequest {
            source: "./anywhere".into(),
            repository: String::new(),
            branch: "main".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::MissingParameter("repository"))
    );
}

#[tokio::test]
async fn test_answer_records_session_history() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let h = harness(8, Arc::new(KeywordEmbedder));
    run_ingestion(&h.services, job_for(tmp.path(), "shop")).await;

    let first = answer(&h.services, "How does login check the password?", Some("shop"), None)
        .await
        .unwrap();
    assert_eq!(first.answer, "Call login() in src/auth.js.");
    assert!(first.sources.iter().any(|s| s == "src/auth.js:1-20"));

    let second = answer(
        &h.services,
        "And where is the token created?",
        Some("shop"),
        Some(&first.session_id),
    )
    .await
    .unwrap();
    assert_eq!(second.session_id, first.session_id);

    let prompts = h.generator.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("user: How does login check the password?"));
    assert!(prompts[1].contains("assistant: Call login() in src/auth.js."));

    let session = h.services.sessions.get(&first.session_id).await.unwrap().unwrap();
    assert_eq!(session.interaction_count, 2);
    assert_eq!(session.interactions[1].query, "And where is the token created?");
}

#[tokio::test]
async fn test_answer_without_matches_uses_no_context() {
    let h = harness(8, Arc::new(KeywordEmbedder));

    let response = answer(&h.services, "What does the billing worker do?", None, None)
        .await
        .unwrap();
    assert!(response.sources.is_empty());

    let prompts = h.generator.prompts.lock().unwrap();
    assert!(prompts[0].contains(NO_CONTEXT));
}

#[tokio::test]
async fn test_generator_failure_fails_request_without_session_write() {
    let index = Arc::new(InMemoryIndex::new());
    let sessions = Arc::new(InMemorySessionStore::new());
    let services = Services::new(
        test_config(8),
        index,
        sessions.clone(),
        Arc::new(InMemoryJobStore::new()),
        Arc::new(KeywordEmbedder),
        Arc::new(FailingGenerator),
    );

    let err = answer(&services, "How do I install it?", None, Some("s-1"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out"));
    assert!(sessions.get("s-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_question_rejected_before_work() {
    let h = harness(8, Arc::new(KeywordEmbedder));
    let err = answer(&h.services, "   ", None, None).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::EmptyQuery)
    );
    assert!(h.generator.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_padded_question_is_trimmed_before_retrieval_and_history() {
    let h = harness(8, Arc::new(KeywordEmbedder));
    let response = answer(&h.services, "   How do I install it?\n", None, None)
        .await
        .unwrap();

    let session = h.services.sessions.get(&response.session_id).await.unwrap().unwrap();
    assert_eq!(session.interactions[0].query, "How do I install it?");
    let prompts = h.generator.prompts.lock().unwrap();
    assert!(prompts[0].contains("## Question\n\nHow do I install it?"));
}

#[tokio::test]
async fn test_file_type_filter_is_exact() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let h = harness(8, Arc::new(KeywordEmbedder));
    run_ingestion(&h.services, job_for(tmp.path(), "shop")).await;

    let filters = SearchFilters {
        repository: Some("shop".into()),
        file_type: Some("markdown".into()),
    };
    let query_vec = KeywordEmbedder.embed("install setup").await.unwrap();
    let hits = h
        .index
        .search_hybrid("install setup", &query_vec, 15, &filters)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|hit| hit.chunk.file_type == "markdown"));
}
