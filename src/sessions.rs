//! SQLite-backed [`SessionStore`].
//!
//! `sessions` holds one header row per conversation; `interactions` holds
//! the append-only history keyed by `(session_id, seq)`. Appending bumps
//! the counter with `UPDATE ... RETURNING` and inserts the new row in the
//! same transaction, so the counter and the history never disagree.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use code_rag_core::models::{Interaction, Session};
use code_rag_core::session::SessionStore;

use crate::sqlite_store::parse_timestamp;

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_interaction(row: &SqliteRow) -> Result<Interaction> {
    let sources_json: String = row.get("sources_json");
    let timestamp: String = row.get("timestamp");
    Ok(Interaction {
        query: row.get("query"),
        response: row.get("response"),
        sources: serde_json::from_str(&sources_json).context("Invalid sources_json")?,
        timestamp: parse_timestamp(&timestamp)?,
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let row = sqlx::query(
            "SELECT id, created_at, updated_at, interaction_count FROM sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let interaction_rows = sqlx::query(
            r#"
            SELECT query, response, sources_json, timestamp
            FROM interactions
            WHERE session_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");
        let count: i64 = row.get("interaction_count");

        Ok(Some(Session {
            id: row.get("id"),
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
            interactions: interaction_rows
                .iter()
                .map(row_to_interaction)
                .collect::<Result<Vec<_>>>()?,
            interaction_count: count as u64,
        }))
    }

    async fn put(&self, session: &Session) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, created_at, updated_at, interaction_count)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                interaction_count = excluded.interaction_count
            "#,
        )
        .bind(&session.id)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .bind(session.interaction_count as i64)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM interactions WHERE session_id = ?")
            .bind(&session.id)
            .execute(&mut *tx)
            .await?;

        for (seq, interaction) in session.interactions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO interactions (session_id, seq, query, response, sources_json, timestamp)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&session.id)
            .bind(seq as i64 + 1)
            .bind(&interaction.query)
            .bind(&interaction.response)
            .bind(serde_json::to_string(&interaction.sources)?)
            .bind(interaction.timestamp.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn append_interaction(&self, session_id: &str, interaction: &Interaction) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, created_at, updated_at, interaction_count)
            VALUES (?, ?, ?, 0)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(session_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let count: i64 = sqlx::query_scalar(
            r#"
            UPDATE sessions
            SET interaction_count = interaction_count + 1, updated_at = ?
            WHERE id = ?
            RETURNING interaction_count
            "#,
        )
        .bind(&now)
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO interactions (session_id, seq, query, response, sources_json, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(count)
        .bind(&interaction.query)
        .bind(&interaction.response)
        .bind(serde_json::to_string(&interaction.sources)?)
        .bind(interaction.timestamp.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(count as u64)
    }

    async fn list_recent_interactions(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Interaction>> {
        let rows = sqlx::query(
            r#"
            SELECT query, response, sources_json, timestamp FROM (
                SELECT seq, query, response, sources_json, timestamp
                FROM interactions
                WHERE session_id = ?
                ORDER BY seq DESC
                LIMIT ?
            )
            ORDER BY seq ASC
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_interaction).collect()
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM interactions WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed > 0)
    }
}
