//! Core data models used throughout code-rag.
//!
//! These types represent the chunks, sessions, and ingestion jobs that flow
//! through the ingestion and retrieval pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structural category of an extracted chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    FileOverview,
    Function,
    Class,
    Route,
    Documentation,
    Configuration,
}

impl ChunkType {
    pub const ALL: [ChunkType; 6] = [
        ChunkType::FileOverview,
        ChunkType::Function,
        ChunkType::Class,
        ChunkType::Route,
        ChunkType::Documentation,
        ChunkType::Configuration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::FileOverview => "file_overview",
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::Route => "route",
            ChunkType::Documentation => "documentation",
            ChunkType::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChunkType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown chunk type: '{}'", s))
    }
}

/// A contiguous, typed unit of extracted file content.
///
/// Line numbers are 1-based and inclusive. Chunks are immutable once
/// created; re-ingestion produces new documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_type: ChunkType,
    pub content: String,
    /// Repository-relative path with `/` separators.
    pub file_path: String,
    pub file_name: String,
    /// Language or category tag derived from the extension (e.g. `"javascript"`).
    pub file_type: String,
    pub repository: String,
    pub branch: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Chunk {
    /// `path:start-end`, used as a source reference in answers.
    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }
}

/// One question/answer exchange within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub query: String,
    pub response: String,
    pub sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Conversation state keyed by an opaque session identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub interactions: Vec<Interaction>,
    pub interaction_count: u64,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            interactions: Vec::new(),
            interaction_count: 0,
        }
    }
}

/// Lifecycle state of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// `completed` and `failed` are final; no further transitions happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => anyhow::bail!("Unknown job status: '{}'", other),
        }
    }
}

/// Observable status record for one repository-ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub repository: String,
    pub branch: String,
    pub source: String,
    pub status: JobStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn pending(
        repository: impl Into<String>,
        branch: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            repository: repository.into(),
            branch: branch.into(),
            source: source.into(),
            status: JobStatus::Pending,
            message: "queued".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `status` with a new progress message.
    ///
    /// Terminal records are left untouched and `false` is returned.
    pub fn transition(&mut self, status: JobStatus, message: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.message = message.into();
        self.updated_at = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_type_roundtrips_through_str() {
        for t in ChunkType::ALL {
            assert_eq!(t.as_str().parse::<ChunkType>().unwrap(), t);
        }
        assert!("method".parse::<ChunkType>().is_err());
    }

    #[test]
    fn test_chunk_type_serializes_snake_case() {
        let json = serde_json::to_string(&ChunkType::FileOverview).unwrap();
        assert_eq!(json, "\"file_overview\"");
    }

    #[test]
    fn test_job_transitions_stop_at_terminal_state() {
        let mut job = JobRecord::pending("demo", "main", "/tmp/demo");
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.transition(JobStatus::Processing, "processing files"));
        assert!(job.transition(JobStatus::Processing, "generating embeddings: 50%"));
        assert!(job.transition(JobStatus::Completed, "done"));
        assert!(!job.transition(JobStatus::Failed, "late failure"));
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.message, "done");
    }

    #[test]
    fn test_job_status_parse() {
        assert_eq!("failed".parse::<JobStatus>().unwrap(), JobStatus::Failed);
        assert!("running".parse::<JobStatus>().is_err());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
