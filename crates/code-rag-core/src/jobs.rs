//! Job status store contract and in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::JobRecord;

/// Persists the observable status of ingestion jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or overwrite a job record.
    async fn put(&self, job: &JobRecord) -> Result<()>;
    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>>;
}

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn put(&self, job: &JobRecord) -> Result<()> {
        self.jobs
            .write()
            .unwrap()
            .insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        Ok(self.jobs.read().unwrap().get(job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryJobStore::new();
        let mut job = JobRecord::pending("demo", "main", "/tmp/demo");
        store.put(&job).await.unwrap();

        job.transition(JobStatus::Processing, "processing files");
        store.put(&job).await.unwrap();

        let loaded = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Processing);
        assert_eq!(loaded.message, "processing files");
        assert!(store.get("nope").await.unwrap().is_none());
    }
}
