//! Repository ingestion.
//!
//! A job moves through these phases, persisting status and message after
//! each transition:
//!
//! ```text
//! pending ─▶ processing "fetching source"
//!         ─▶ processing "processing files"
//!         ─▶ processing "generating embeddings: NN%"   (after every batch)
//!         ─▶ completed  "indexed X of Y chunks from Z files (W skipped)"
//! ```
//!
//! A phase error (source fetch, walk, re-ingestion delete) ends the job as
//! `failed`. Embedding and indexing run in batches of `ingest.batch_size`:
//! items in a batch run concurrently, batches run one after another, and a
//! failed item is logged and left out of the success count.

use anyhow::{Context, Result};
use futures::future::join_all;

use code_rag_core::embedding::{prepare_chunk_text, EmbeddingProvider};
use code_rag_core::models::{Chunk, JobRecord, JobStatus};
use code_rag_core::store::HybridIndex;

use crate::config::ReingestPolicy;
use crate::connector_git::resolve_source;
use crate::extract::{extract_repository, ExtractionReport};
use crate::services::Services;

/// Outcome of embedding and indexing a set of chunks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Embed and index one batch concurrently.
///
/// Per-item failures are logged and counted, never propagated.
pub async fn index_batch(
    index: &dyn HybridIndex,
    embedder: &dyn EmbeddingProvider,
    batch: &[Chunk],
) -> IndexReport {
    let results = join_all(batch.iter().map(|chunk| async move {
        let vector = embedder
            .embed(&prepare_chunk_text(chunk))
            .await
            .context("embedding failed")?;
        index
            .index(chunk, &vector)
            .await
            .context("index write failed")
    }))
    .await;

    let mut report = IndexReport::default();
    for (chunk, result) in batch.iter().zip(results) {
        match result {
            Ok(_) => report.succeeded += 1,
            Err(err) => {
                tracing::warn!(
                    chunk = %chunk.location(),
                    chunk_type = %chunk.chunk_type,
                    error = %format!("{err:#}"),
                    "skipping chunk"
                );
                report.failed += 1;
            }
        }
    }
    report
}

async fn save(services: &Services, job: &JobRecord) {
    if let Err(err) = services.jobs.put(job).await {
        tracing::warn!(job = %job.id, error = %err, "failed to persist job status");
    }
}

async fn advance(services: &Services, job: &mut JobRecord, message: String) {
    tracing::info!(job = %job.id, repository = %job.repository, "{message}");
    job.transition(JobStatus::Processing, message);
    save(services, job).await;
}

/// Run one ingestion job to a terminal state and return the final record.
pub async fn run_ingestion(services: &Services, mut job: JobRecord) -> JobRecord {
    match run_phases(services, &mut job).await {
        Ok(summary) => {
            tracing::info!(job = %job.id, repository = %job.repository, "{summary}");
            job.transition(JobStatus::Completed, summary);
        }
        Err(err) => {
            let message = format!("{err:#}");
            tracing::error!(job = %job.id, repository = %job.repository, error = %message, "ingestion failed");
            job.transition(JobStatus::Failed, message);
        }
    }
    save(services, &job).await;
    job
}

async fn run_phases(services: &Services, job: &mut JobRecord) -> Result<String> {
    let ingest = &services.config.ingest;

    advance(services, job, "fetching source".to_string()).await;
    let root = resolve_source(&job.source, &job.branch, ingest)
        .await
        .with_context(|| format!("failed to fetch source {}", job.source))?;

    advance(services, job, "processing files".to_string()).await;
    let report = {
        let repository = job.repository.clone();
        let branch = job.branch.clone();
        let ingest = ingest.clone();
        tokio::task::spawn_blocking(move || {
            extract_repository(&root, &repository, &branch, &ingest)
        })
        .await??
    };
    let ExtractionReport {
        chunks,
        files_processed,
        files_skipped,
    } = report;

    if ingest.reingest == ReingestPolicy::Replace {
        let removed = services
            .index
            .delete_by_filter(&job.repository)
            .await
            .context("failed to clear previous documents")?;
        tracing::info!(job = %job.id, removed, "cleared previous documents");
    }

    let total = chunks.len();
    let mut indexed = IndexReport::default();
    advance(services, job, "generating embeddings: 0%".to_string()).await;
    for batch in chunks.chunks(ingest.batch_size.max(1)) {
        let report = index_batch(services.index.as_ref(), services.embedder.as_ref(), batch).await;
        indexed.succeeded += report.succeeded;
        indexed.failed += report.failed;
        let done = indexed.succeeded + indexed.failed;
        advance(
            services,
            job,
            format!("generating embeddings: {}%", done * 100 / total),
        )
        .await;
    }

    if indexed.succeeded == 0 && total > 0 {
        tracing::warn!(
            job = %job.id,
            repository = %job.repository,
            failed = indexed.failed,
            replaced = ingest.reingest == ReingestPolicy::Replace,
            "no chunks indexed; the repository has no documents until the next successful run"
        );
    }

    Ok(format!(
        "indexed {} of {} chunks from {} files ({} skipped)",
        indexed.succeeded, total, files_processed, files_skipped
    ))
}
