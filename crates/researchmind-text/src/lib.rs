//! researchmind-text
//!
//! In-memory BM25 lexical scoring over a user's chunk list, backed by a
//! RAM-only tantivy index.

pub mod index;
pub mod tantivy_utils;

pub use index::{rank, LexicalIndex};
