//! Retrieval client for callpilot.
//!
//! The vector store itself is an external collaborator; this crate owns
//! the search interface ([`VectorSearch`]), the HTTP adapter for a
//! Qdrant-style store, and the two composites the pipelines use:
//! reciprocal-rank fusion and staged category search.

pub mod engine;
pub mod fusion;
pub mod item;
pub mod offline;
pub mod qdrant;

pub use engine::{SearchEngine, SearchMode, StagedQuery, VectorSearch};
pub use fusion::rrf_fuse;
pub use item::{build_context, Evidence, RetrievedItem};
pub use offline::OfflineStore;
pub use qdrant::QdrantStore;
