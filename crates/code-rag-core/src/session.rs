//! Session store contract and in-memory implementation.
//!
//! Sessions are append-only conversation histories. The query path is the
//! single appender: [`SessionStore::append_interaction`] atomically bumps
//! the counter and appends, creating the session if it does not exist.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{Interaction, Session};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<Session>>;

    /// Create or overwrite a session.
    async fn put(&self, session: &Session) -> Result<()>;

    /// Append one interaction, creating the session if absent.
    ///
    /// Returns the new interaction count.
    async fn append_interaction(&self, session_id: &str, interaction: &Interaction) -> Result<u64>;

    /// The most recent `limit` interactions, oldest first.
    async fn list_recent_interactions(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Interaction>>;

    /// Remove a session. Returns `false` if it did not exist.
    async fn delete(&self, session_id: &str) -> Result<bool>;
}

/// In-memory session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().unwrap().get(session_id).cloned())
    }

    async fn put(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn append_interaction(&self, session_id: &str, interaction: &Interaction) -> Result<u64> {
        let mut sessions = self.sessions.write().unwrap();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));
        session.interactions.push(interaction.clone());
        session.interaction_count += 1;
        session.updated_at = Utc::now();
        Ok(session.interaction_count)
    }

    async fn list_recent_interactions(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Interaction>> {
        let sessions = self.sessions.read().unwrap();
        Ok(sessions
            .get(session_id)
            .map(|s| {
                let skip = s.interactions.len().saturating_sub(limit);
                s.interactions[skip..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.write().unwrap().remove(session_id).is_some())
    }
}
