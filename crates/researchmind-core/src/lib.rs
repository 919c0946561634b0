//! researchmind-core
//!
//! Shared data model, collaborator traits, error taxonomy, configuration and
//! plain-text segmentation for the research assistant crates.

pub mod config;
pub mod error;
pub mod segment;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{Chunk, ChunkId, GenerationParams, RetrievalResult, SourceType, WebDocument};
