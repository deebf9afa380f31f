//! Ingestion job queue.
//!
//! [`JobQueue::submit`] validates the request, records the job as
//! `pending`, and hands it to a dispatcher task over an mpsc channel. The
//! caller gets the job id back immediately. The dispatcher spawns each job
//! as its own task, so jobs for different repositories run concurrently.

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::sync::mpsc;

use code_rag_core::jobs::JobStore;
use code_rag_core::models::JobRecord;
use code_rag_core::ValidationError;

use crate::ingest::run_ingestion;
use crate::services::Services;

const QUEUE_CAPACITY: usize = 64;

fn default_branch() -> String {
    "main".to_string()
}

/// Parameters for one ingestion run.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    /// Local directory or git remote.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl IngestRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source.trim().is_empty() {
            return Err(ValidationError::MissingParameter("source"));
        }
        if self.repository.trim().is_empty() {
            return Err(ValidationError::MissingParameter("repository"));
        }
        if self.branch.trim().is_empty() {
            return Err(ValidationError::MissingParameter("branch"));
        }
        // Both end up on a git command line.
        if self.source.trim_start().starts_with('-') {
            return Err(ValidationError::OptionLikeParameter("source"));
        }
        if self.branch.trim_start().starts_with('-') {
            return Err(ValidationError::OptionLikeParameter("branch"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct JobQueue {
    services: Services,
    sender: mpsc::Sender<JobRecord>,
}

impl JobQueue {
    /// Start the dispatcher on the current tokio runtime.
    pub fn start(services: Services) -> Self {
        let (sender, mut receiver) = mpsc::channel::<JobRecord>(QUEUE_CAPACITY);
        let worker_services = services.clone();

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let services = worker_services.clone();
                tokio::spawn(async move {
                    run_ingestion(&services, job).await;
                });
            }
            tracing::debug!("job queue closed");
        });

        Self { services, sender }
    }

    /// Validate, persist as `pending`, and enqueue. Returns the job id.
    pub async fn submit(&self, request: IngestRequest) -> Result<String> {
        request.validate()?;

        let job = JobRecord::pending(
            request.repository.trim(),
            request.branch.trim(),
            request.source.trim(),
        );
        let id = job.id.clone();
        self.services.jobs.put(&job).await?;
        tracing::info!(job = %id, repository = %job.repository, source = %job.source, "job queued");

        self.sender
            .send(job)
            .await
            .map_err(|_| anyhow!("job queue is not running"))?;
        Ok(id)
    }
}

/// Poll `jobs` until the job reaches a terminal state.
pub async fn wait_for_job(
    jobs: &dyn JobStore,
    job_id: &str,
    interval: Duration,
    mut on_update: impl FnMut(&JobRecord),
) -> Result<JobRecord> {
    let mut last_message = String::new();
    loop {
        let job = jobs
            .get(job_id)
            .await?
            .ok_or_else(|| ValidationError::UnknownJob(job_id.to_string()))?;
        if job.message != last_message {
            last_message = job.message.clone();
            on_update(&job);
        }
        if job.status.is_terminal() {
            return Ok(job);
        }
        tokio::time::sleep(interval).await;
    }
}
