//! Domain types shared by the retrieval engines and the research pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type ChunkId = u64;

/// A window of source text that is independently indexed.
///
/// - `chunk_id`: unique per user, stable across reloads
/// - `text`: the payload embedded and scored
/// - `word_count`/`start_word`/`end_word`: position of the window in the
///   whitespace-split source document (`end_word` is exclusive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub text: String,
    pub word_count: usize,
    pub start_word: usize,
    pub end_word: usize,
}

impl Chunk {
    /// Builds a chunk that covers the whole of `text`.
    pub fn from_text(chunk_id: ChunkId, text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self { chunk_id, text, word_count, start_word: 0, end_word: word_count }
    }
}

/// Where a piece of evidence came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Document,
    Web,
    Summary,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Document => "document",
            SourceType::Web => "web",
            SourceType::Summary => "summary",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// One ranked hit handed from retrieval to the pipeline.
///
/// `score` is stage-specific and only comparable within one result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: ChunkId,
    pub text: String,
    pub score: f32,
    pub source: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
}

/// A snippet returned by the web search collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebDocument {
    pub source: String,
    pub url: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(rename = "type")]
    pub source_type: SourceType,
}

/// Sampling knobs passed to the text generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationParams {
    pub const fn new(temperature: f32, max_tokens: u32) -> Self { Self { temperature, max_tokens } }
}
