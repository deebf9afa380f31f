//! # code-rag CLI (`crag`)
//!
//! ```bash
//! crag --config ./config/crag.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `crag init` | Create the SQLite database and run schema migrations |
//! | `crag ingest <source> --repo <name>` | Index a local directory or git remote |
//! | `crag job <id>` | Show an ingestion job record |
//! | `crag ask "<question>"` | Answer a question from indexed code |
//! | `crag search "<query>"` | Ranked chunks, no generation |
//! | `crag stats` | Document counts by file type and chunk type |
//! | `crag delete <repo>` | Remove every document of a repository |
//! | `crag serve` | Start the HTTP API |
//! | `crag completions <shell>` | Print shell completions |
//!
//! Logs go to stderr; set `RUST_LOG` to change the level (default `info`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use code_rag::answer::answer;
use code_rag::config;
use code_rag::connector_git::resolve_source;
use code_rag::extract::extract_repository;
use code_rag::migrate;
use code_rag::progress::ProgressMode;
use code_rag::queue::{wait_for_job, IngestRequest, JobQueue};
use code_rag::search::run_search;
use code_rag::server::run_server;
use code_rag::services::Services;
use code_rag::stats::{run_delete, run_stats};
use code_rag_core::models::JobStatus;
use code_rag_core::ValidationError;

/// code-rag: ask questions about source-code repositories.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/crag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "crag",
    about = "code-rag: retrieval-augmented question answering over source-code repositories",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/crag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it again is safe.
    Init,

    /// Index a repository from a local directory or a git remote.
    ///
    /// Prints the job id, then waits for the job to finish.
    Ingest {
        /// Local directory path or git URL.
        source: String,

        /// Repository name stored with every chunk.
        #[arg(long)]
        repo: String,

        #[arg(long, default_value = "main")]
        branch: String,

        /// Progress output on stderr. Defaults to `human` on a terminal.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,

        /// Extract only; print file and chunk counts without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show an ingestion job record as JSON.
    Job { id: String },

    /// Answer a question using indexed code as context.
    Ask {
        question: String,

        /// Restrict retrieval to one repository.
        #[arg(long)]
        repo: Option<String>,

        /// Continue an existing conversation.
        #[arg(long)]
        session: Option<String>,
    },

    /// Print ranked chunks for a query.
    Search {
        query: String,

        #[arg(long)]
        repo: Option<String>,

        /// Exact file type, e.g. `javascript` or `markdown`.
        #[arg(long)]
        file_type: Option<String>,
    },

    /// Show index statistics.
    Stats {
        #[arg(long)]
        repo: Option<String>,
    },

    /// Delete every indexed document of a repository.
    Delete { repo: String },

    /// Start the HTTP API server on `[server].bind`.
    Serve,

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "crag", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            source,
            repo,
            branch,
            progress,
            dry_run,
        } => {
            if dry_run {
                let request = IngestRequest {
                    source,
                    repository: repo,
                    branch,
                };
                request.validate()?;
                let root = resolve_source(&request.source, &request.branch, &cfg.ingest).await?;
                let report =
                    extract_repository(&root, &request.repository, &request.branch, &cfg.ingest)?;
                println!(
                    "Dry run: {} files processed, {} skipped, {} chunks",
                    report.files_processed,
                    report.files_skipped,
                    report.chunks.len()
                );
                for (chunk_type, count) in report.counts_by_type() {
                    println!("  {:<16} {:>6}", chunk_type, count);
                }
                return Ok(());
            }

            let services = Services::from_config(cfg).await?;
            let queue = JobQueue::start(services.clone());
            let job_id = queue
                .submit(IngestRequest {
                    source,
                    repository: repo,
                    branch,
                })
                .await?;
            println!("{}", job_id);

            let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
            let job = wait_for_job(
                services.jobs.as_ref(),
                &job_id,
                Duration::from_millis(250),
                |job| reporter.report(job),
            )
            .await?;
            if job.status == JobStatus::Failed {
                bail!("ingestion failed: {}", job.message);
            }
            println!("{}", job.message);
        }
        Commands::Job { id } => {
            let services = Services::from_config(cfg).await?;
            let job = services
                .jobs
                .get(&id)
                .await?
                .ok_or(ValidationError::UnknownJob(id))?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Commands::Ask {
            question,
            repo,
            session,
        } => {
            let services = Services::from_config(cfg).await?;
            let response = answer(&services, &question, repo.as_deref(), session.as_deref()).await?;
            println!("{}", response.answer);
            if !response.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &response.sources {
                    println!("  {}", source);
                }
            }
            println!();
            println!("session: {}", response.session_id);
        }
        Commands::Search {
            query,
            repo,
            file_type,
        } => {
            let services = Services::from_config(cfg).await?;
            run_search(&services, &query, repo, file_type).await?;
        }
        Commands::Stats { repo } => {
            let services = Services::from_config(cfg).await?;
            run_stats(&services, repo.as_deref()).await?;
        }
        Commands::Delete { repo } => {
            let services = Services::from_config(cfg).await?;
            run_delete(&services, &repo).await?;
        }
        Commands::Serve => {
            let services = Services::from_config(cfg).await?;
            run_server(services).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
