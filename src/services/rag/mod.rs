//! Retrieval-augmented answering
//!
//! Query path: embed the query, load (or build and cache) the document's
//! evidence set, rank it by cosine similarity, feed the top-K to generation.

mod cache;
mod chunker;
mod orchestrator;
mod ranker;
mod types;

pub use cache::EvidenceCache;
pub use chunker::{chunk_document, chunk_text};
pub use orchestrator::RagOrchestrator;
pub use ranker::{cosine_similarity, rank, select_top_k};
pub use types::{Chunk, ChunkSource, EvidenceSet, RagAnswer};
