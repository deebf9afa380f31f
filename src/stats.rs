//! Index statistics and repository deletion.
//!
//! Used by `crag stats`, `crag delete`, and the matching HTTP routes.

use anyhow::Result;

use code_rag_core::store::IndexStats;
use code_rag_core::ValidationError;

use crate::services::Services;

/// Aggregate counts for one repository, or the whole index.
pub async fn repository_stats(services: &Services, repository: Option<&str>) -> Result<IndexStats> {
    services.index.aggregate_stats(repository).await
}

/// Remove every document of `repository`. Returns the number removed.
pub async fn delete_repository(services: &Services, repository: &str) -> Result<u64> {
    let repository = repository.trim();
    if repository.is_empty() {
        return Err(ValidationError::MissingParameter("repository").into());
    }
    let removed = services.index.delete_by_filter(repository).await?;
    tracing::info!(repository, removed, "deleted repository documents");
    Ok(removed)
}

pub async fn run_stats(services: &Services, repository: Option<&str>) -> Result<()> {
    let stats = repository_stats(services, repository).await?;
    let db_size = std::fs::metadata(&services.config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("code-rag index stats");
    println!("====================");
    println!();
    println!("  Database:    {}", services.config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Repository:  {}", repository.unwrap_or("(all)"));
    println!();
    println!("  Documents:   {}", stats.total_documents);
    println!("  Files:       {}", stats.distinct_files);

    print_buckets("By file type:", "FILE TYPE", &stats.by_file_type);
    print_buckets("By chunk type:", "CHUNK TYPE", &stats.by_chunk_type);
    println!();
    Ok(())
}

pub async fn run_delete(services: &Services, repository: &str) -> Result<()> {
    let removed = delete_repository(services, repository).await?;
    println!("Deleted {} documents from '{}'.", removed, repository.trim());
    Ok(())
}

fn print_buckets(title: &str, header: &str, buckets: &std::collections::BTreeMap<String, u64>) {
    if buckets.is_empty() {
        return;
    }
    let mut rows: Vec<(&String, &u64)> = buckets.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    println!();
    println!("  {}", title);
    println!("  {:<24} {:>8}", header, "DOCS");
    println!("  {}", "-".repeat(33));
    for (name, count) in rows {
        println!("  {:<24} {:>8}", name, count);
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
