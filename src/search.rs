//! `crag search`: ranked retrieval without generation.

use anyhow::Result;

use code_rag_core::error::validate_query;
use code_rag_core::search::{filter_and_rank, RankedChunk};
use code_rag_core::store::SearchFilters;

use crate::services::Services;

/// Hybrid search plus ranking, with both exact-match filters available.
pub async fn search_ranked(
    services: &Services,
    query: &str,
    filters: &SearchFilters,
) -> Result<Vec<RankedChunk>> {
    let retrieval = &services.config.retrieval;
    let query = validate_query(query, retrieval.max_query_chars)?;
    let params = retrieval.ranking_params();

    let query_vec = services.embedder.embed(query).await?;
    let candidates = services
        .index
        .search_hybrid(query, &query_vec, params.candidate_k, filters)
        .await?;
    Ok(filter_and_rank(query, candidates, &params))
}

pub async fn run_search(
    services: &Services,
    query: &str,
    repository: Option<String>,
    file_type: Option<String>,
) -> Result<()> {
    let filters = SearchFilters {
        repository,
        file_type,
    };
    let ranked = search_ranked(services, query, &filters).await?;

    if ranked.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in ranked.iter().enumerate() {
        let chunk = &result.chunk;
        println!(
            "{}. [{:.2}] {} ({})",
            i + 1,
            result.adjusted_score,
            chunk.location(),
            chunk.chunk_type
        );
        if let Some(name) = chunk.class_name.as_ref().or(chunk.function_name.as_ref()) {
            println!("    name: {}", name);
        }
        println!("    repository: {}@{}", chunk.repository, chunk.branch);
        if result.adjusted_score != result.raw_score {
            println!("    raw score: {:.2}", result.raw_score);
        }
        let excerpt: String = chunk.content.chars().take(160).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        println!();
    }

    Ok(())
}
