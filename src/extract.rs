//! Whole-repository chunk extraction.
//!
//! Walks the tree with [`crate::walk::collect_files`], reads each file, and
//! hands the text to [`code_rag_core::chunk::extract_chunks`]. A file that
//! cannot be read, is not UTF-8, exceeds `ingest.max_file_bytes`, or yields
//! no chunks is counted as skipped; the pass always continues.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

use code_rag_core::chunk::{extract_chunks, SourceFile};
use code_rag_core::models::Chunk;

use crate::config::IngestConfig;
use crate::walk::collect_files;

/// Result of one extraction pass.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub chunks: Vec<Chunk>,
    pub files_processed: usize,
    pub files_skipped: usize,
}

impl ExtractionReport {
    /// Chunk counts keyed by chunk type name.
    pub fn counts_by_type(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for chunk in &self.chunks {
            *counts.entry(chunk.chunk_type.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// Extract chunks from every supported, non-ignored file under `root`.
///
/// Only a failure to enumerate the tree is an error.
pub fn extract_repository(
    root: &Path,
    repository: &str,
    branch: &str,
    config: &IngestConfig,
) -> Result<ExtractionReport> {
    let files = collect_files(root, config)?;
    let mut report = ExtractionReport::default();

    for file in files {
        match std::fs::metadata(&file.path) {
            Ok(meta) if meta.len() > config.max_file_bytes => {
                tracing::warn!(
                    file = %file.relative,
                    bytes = meta.len(),
                    limit = config.max_file_bytes,
                    "skipping oversized file"
                );
                report.files_skipped += 1;
                continue;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(file = %file.relative, error = %err, "skipping unreadable file");
                report.files_skipped += 1;
                continue;
            }
        }

        let content = match std::fs::read_to_string(&file.path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(file = %file.relative, error = %err, "skipping unreadable file");
                report.files_skipped += 1;
                continue;
            }
        };

        let chunks = extract_chunks(&SourceFile {
            repository,
            branch,
            file_path: &file.relative,
            content: &content,
        });
        if chunks.is_empty() {
            report.files_skipped += 1;
            continue;
        }

        tracing::debug!(file = %file.relative, chunks = chunks.len(), "extracted");
        report.files_processed += 1;
        report.chunks.extend(chunks);
    }

    Ok(report)
}
