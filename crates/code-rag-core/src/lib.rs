//! # code-rag core
//!
//! Pure logic for code-rag: the data model, heuristic chunk extraction,
//! the hybrid index / session / job store contracts (with in-memory
//! implementations), intent-aware ranking, and context assembly.
//!
//! This crate performs no filesystem, network, or database I/O. The
//! application crate supplies concrete stores and providers and passes
//! them into the entry points defined here.
//!
//! ```text
//! file text ──▶ chunk::extract_chunks ──▶ Vec<Chunk>
//!                                            │ embedding::prepare_chunk_text
//!                                            ▼
//!                                     HybridIndex::index
//!
//! query ──▶ search::retrieve ──▶ Vec<RankedChunk> ──▶ context::assemble_context
//! ```

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod jobs;
pub mod languages;
pub mod models;
pub mod patterns;
pub mod search;
pub mod session;
pub mod store;

pub use error::ValidationError;
pub use models::{Chunk, ChunkType, Interaction, JobRecord, JobStatus, Session};
