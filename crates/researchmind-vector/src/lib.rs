//! researchmind-vector
//!
//! Flat dense index with paired on-disk persistence for one user's chunks.

pub mod index;
pub mod store;

pub use index::{similarity, DenseIndex};
pub use store::{ScoredChunk, VectorStore, CHUNKS_FILE, INDEX_FILE};
