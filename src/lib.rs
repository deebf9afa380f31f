//! # code-rag
//!
//! Retrieval-augmented question answering over source-code repositories.
//!
//! Repositories are walked, split into typed chunks (file overviews,
//! functions, classes, routes, documentation sections, configuration),
//! embedded, and written to a hybrid (FTS5 + vector) index in SQLite.
//! Questions are answered by ranking retrieved chunks with intent boosts,
//! assembling them into a bounded context, and calling a generator.
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ local dir / │──▶│ walk+extract │──▶│  JobQueue    │──▶ SQLite
//! │ git remote  │   │ (chunks)     │   │ embed+index  │   documents + FTS5
//! └─────────────┘   └──────────────┘   └──────────────┘
//!                                                          │
//!             ┌──────────┐      ┌────────────────────┐     │
//!  question ─▶│ retrieve │─────▶│ assemble + generate│◀────┘
//!             └──────────┘      └────────────────────┘
//! ```
//!
//! The pure pieces (chunking, ranking, context assembly, store traits)
//! live in [`code_rag_core`]; this crate supplies configuration, storage,
//! providers, orchestration, the HTTP API, and the `crag` CLI.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`], [`migrate`] | SQLite connection and schema |
//! | [`sqlite_store`], [`sessions`], [`jobs`] | SQLite-backed stores |
//! | [`embedding`], [`generator`] | HTTP model providers |
//! | [`walk`], [`connector_git`], [`extract`] | Source resolution and chunk extraction |
//! | [`ingest`], [`queue`] | Ingestion jobs |
//! | [`answer`], [`search`], [`stats`] | Query-side operations |
//! | [`server`] | HTTP API |

pub mod answer;
pub mod config;
pub mod connector_git;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generator;
pub mod ingest;
pub mod jobs;
pub mod migrate;
pub mod progress;
pub mod queue;
pub mod search;
pub mod server;
pub mod services;
pub mod sessions;
pub mod sqlite_store;
pub mod stats;
pub mod walk;
