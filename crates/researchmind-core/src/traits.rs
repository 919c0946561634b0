use async_trait::async_trait;

use crate::error::Result;
use crate::types::{GenerationParams, WebDocument};

/// Turns text into fixed-width dense vectors.
///
/// Indexing goes through `embed_batch`; query time uses `embed`.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// May return zero documents; an unreachable backend is an error.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebDocument>>;
}
