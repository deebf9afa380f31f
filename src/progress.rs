//! Job progress reporting for `crag ingest`.
//!
//! While the CLI polls the job store, each change of status message is
//! handed to a [`ProgressReporter`]. Output goes to **stderr** so stdout
//! stays parseable for scripts.

use std::io::{IsTerminal, Write};

use code_rag_core::models::JobRecord;

/// Receives job records whose message changed since the last poll.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, job: &JobRecord);
}

/// Human-friendly lines: `ingest shop@main  processing  generating embeddings: 40%`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, job: &JobRecord) {
        let line = format!(
            "ingest {}@{}  {}  {}\n",
            job.repository, job.branch, job.status, job.message
        );
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, job: &JobRecord) {
        let obj = serde_json::json!({
            "event": "progress",
            "job_id": job.id,
            "repository": job.repository,
            "status": job.status,
            "message": job.message,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _job: &JobRecord) {}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a terminal, otherwise off.
    pub fn default_for_tty() -> Self {
        if std::io::stderr().is_terminal() {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
