//! Question answering over an indexed repository.
//!
//! Validate, embed the question, retrieve and rank, assemble context,
//! render the prompt with recent history, generate, then record the
//! interaction. A failure at any step fails the whole request and nothing
//! is written to the session.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use code_rag_core::context::assemble_context;
use code_rag_core::error::validate_query;
use code_rag_core::generate::render_prompt;
use code_rag_core::models::Interaction;
use code_rag_core::search::{retrieve, RankedChunk};

use crate::services::Services;

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    /// `path:start-end` for each chunk used as context.
    pub sources: Vec<String>,
    pub session_id: String,
}

/// Embed an already validated question and rank the retrieved chunks.
async fn ranked_chunks(
    services: &Services,
    question: &str,
    repository: Option<&str>,
) -> Result<Vec<RankedChunk>> {
    let query_vec = services.embedder.embed(question).await?;
    retrieve(
        services.index.as_ref(),
        question,
        &query_vec,
        repository,
        &services.config.retrieval.ranking_params(),
    )
    .await
}

pub async fn answer(
    services: &Services,
    question: &str,
    repository: Option<&str>,
    session_id: Option<&str>,
) -> Result<AnswerResponse> {
    let retrieval = &services.config.retrieval;
    let question = validate_query(question, retrieval.max_query_chars)?;

    let ranked = ranked_chunks(services, question, repository).await?;
    let context = assemble_context(ranked.iter().map(|r| &r.chunk));
    let sources: Vec<String> = ranked.iter().map(|r| r.chunk.location()).collect();

    let session_id = match session_id {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    };
    let history = services
        .sessions
        .list_recent_interactions(&session_id, retrieval.history_limit)
        .await?;

    let prompt = render_prompt(&context, &history, question);
    let response = services.generator.generate(&prompt).await?;

    let count = services
        .sessions
        .append_interaction(
            &session_id,
            &Interaction {
                query: question.to_string(),
                response: response.clone(),
                sources: sources.clone(),
                timestamp: Utc::now(),
            },
        )
        .await?;
    tracing::info!(
        session = %session_id,
        sources = sources.len(),
        interactions = count,
        "answered"
    );

    Ok(AnswerResponse {
        answer: response,
        sources,
        session_id,
    })
}
