//! SQLite-backed [`HybridIndex`] implementation.
//!
//! Each indexed chunk is one row in `documents` (with its embedding as a
//! little-endian f32 BLOB) plus one row in the `documents_fts` FTS5 table.
//!
//! Hybrid search runs two candidate queries and merges them in Rust:
//!
//! 1. FTS5 `MATCH` over any query term, ranked by `bm25`.
//! 2. Brute-force cosine similarity over the stored embeddings.
//!
//! Both honour the same exact-match filters; the union is scored with the
//! configured [`HybridWeights`].

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use code_rag_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use code_rag_core::models::{Chunk, ChunkType};
use code_rag_core::store::{
    merge_hybrid, query_terms, Candidate, HybridIndex, HybridWeights, IndexStats, SearchFilters,
    SearchHit,
};

const DOCUMENT_COLUMNS: &str = "id, repository, branch, file_path, file_name, file_type, \
chunk_type, content, start_line, end_line, function_name, class_name, description, indexed_at";

/// SQLite implementation of the [`HybridIndex`] trait.
pub struct SqliteIndex {
    pool: SqlitePool,
    weights: HybridWeights,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool, weights: HybridWeights) -> Self {
        Self { pool, weights }
    }

    async fn text_candidates(
        &self,
        text: &str,
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Candidate>> {
        let terms = query_terms(text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let match_expr = terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR ");

        let rows = sqlx::query(
            r#"
            SELECT documents_fts.doc_id AS id, bm25(documents_fts) AS bm25_score
            FROM documents_fts
            JOIN documents d ON d.id = documents_fts.doc_id
            WHERE documents_fts MATCH ?
              AND (? IS NULL OR d.repository = ?)
              AND (? IS NULL OR d.file_type = ?)
            ORDER BY bm25_score, d.rowid
            LIMIT ?
            "#,
        )
        .bind(&match_expr)
        .bind(&filters.repository)
        .bind(&filters.repository)
        .bind(&filters.file_type)
        .bind(&filters.file_type)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                // bm25() is lower-is-better
                let bm25: f64 = row.get("bm25_score");
                Candidate {
                    id: row.get("id"),
                    score: -bm25,
                }
            })
            .collect())
    }

    async fn vector_candidates(
        &self,
        vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Candidate>> {
        let rows = sqlx::query(
            r#"
            SELECT id, embedding
            FROM documents
            WHERE (? IS NULL OR repository = ?)
              AND (? IS NULL OR file_type = ?)
            ORDER BY rowid
            "#,
        )
        .bind(&filters.repository)
        .bind(&filters.repository)
        .bind(&filters.file_type)
        .bind(&filters.file_type)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates: Vec<Candidate> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                Candidate {
                    id: row.get("id"),
                    score: cosine_similarity(vector, &blob_to_vec(&blob)) as f64,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(k);
        Ok(candidates)
    }

    /// Load documents by id, returned in the order of `scored`.
    async fn load_hits(&self, scored: &[(String, f64)]) -> Result<Vec<SearchHit>> {
        if scored.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; scored.len()].join(", ");
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for (id, _) in scored {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut by_id: HashMap<String, SqliteRow> = rows
            .into_iter()
            .map(|row| (row.get::<String, _>("id"), row))
            .collect();

        scored
            .iter()
            .filter_map(|(id, score)| by_id.remove(id).map(|row| row_to_hit(&row, *score)))
            .collect()
    }
}

fn row_to_hit(row: &SqliteRow, score: f64) -> Result<SearchHit> {
    let chunk_type: String = row.get("chunk_type");
    let indexed_at: String = row.get("indexed_at");
    let start_line: i64 = row.get("start_line");
    let end_line: i64 = row.get("end_line");

    Ok(SearchHit {
        id: row.get("id"),
        score,
        chunk: Chunk {
            chunk_type: chunk_type.parse::<ChunkType>()?,
            content: row.get("content"),
            file_path: row.get("file_path"),
            file_name: row.get("file_name"),
            file_type: row.get("file_type"),
            repository: row.get("repository"),
            branch: row.get("branch"),
            start_line: start_line as usize,
            end_line: end_line as usize,
            function_name: row.get("function_name"),
            class_name: row.get("class_name"),
            description: row.get("description"),
        },
        indexed_at: parse_timestamp(&indexed_at)?,
    })
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp in database: {value}"))?
        .with_timezone(&Utc))
}

/// Declared names made searchable alongside content.
fn fts_names(chunk: &Chunk) -> String {
    [&chunk.function_name, &chunk.class_name, &chunk.description]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

async fn count_by(
    pool: &SqlitePool,
    column: &str,
    repository: Option<&str>,
) -> Result<BTreeMap<String, u64>> {
    let sql = format!(
        "SELECT {column} AS bucket, COUNT(*) AS n FROM documents \
         WHERE (? IS NULL OR repository = ?) GROUP BY {column}"
    );
    let rows = sqlx::query(&sql)
        .bind(repository)
        .bind(repository)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(|row| {
            let n: i64 = row.get("n");
            (row.get::<String, _>("bucket"), n as u64)
        })
        .collect())
}

#[async_trait]
impl HybridIndex for SqliteIndex {
    async fn index(&self, chunk: &Chunk, embedding: &[f32]) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let blob = vec_to_blob(embedding);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, repository, branch, file_path, file_name, file_type,
                                   chunk_type, content, start_line, end_line, function_name,
                                   class_name, description, embedding, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&chunk.repository)
        .bind(&chunk.branch)
        .bind(&chunk.file_path)
        .bind(&chunk.file_name)
        .bind(&chunk.file_type)
        .bind(chunk.chunk_type.as_str())
        .bind(&chunk.content)
        .bind(chunk.start_line as i64)
        .bind(chunk.end_line as i64)
        .bind(&chunk.function_name)
        .bind(&chunk.class_name)
        .bind(&chunk.description)
        .bind(&blob)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO documents_fts (doc_id, content, file_path, names) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&chunk.content)
            .bind(&chunk.file_path)
            .bind(fts_names(chunk))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn search_vector(
        &self,
        vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let scored: Vec<(String, f64)> = self
            .vector_candidates(vector, k, filters)
            .await?
            .into_iter()
            .map(|c| (c.id, c.score))
            .collect();
        self.load_hits(&scored).await
    }

    async fn search_hybrid(
        &self,
        text: &str,
        vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let text_candidates = self.text_candidates(text, k, filters).await?;
        let vector_candidates = self.vector_candidates(vector, k, filters).await?;

        let mut merged = merge_hybrid(&text_candidates, &vector_candidates, self.weights);
        merged.truncate(k);
        self.load_hits(&merged).await
    }

    async fn aggregate_stats(&self, repository: Option<&str>) -> Result<IndexStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(DISTINCT repository || char(0) || file_path) AS files
            FROM documents
            WHERE (? IS NULL OR repository = ?)
            "#,
        )
        .bind(repository)
        .bind(repository)
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.get("total");
        let files: i64 = row.get("files");

        Ok(IndexStats {
            total_documents: total as u64,
            distinct_files: files as u64,
            by_file_type: count_by(&self.pool, "file_type", repository).await?,
            by_chunk_type: count_by(&self.pool, "chunk_type", repository).await?,
        })
    }

    async fn delete_by_filter(&self, repository: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM documents_fts WHERE doc_id IN (SELECT id FROM documents WHERE repository = ?)",
        )
        .bind(repository)
        .execute(&mut *tx)
        .await?;

        let removed = sqlx::query("DELETE FROM documents WHERE repository = ?")
            .bind(repository)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(removed)
    }
}
