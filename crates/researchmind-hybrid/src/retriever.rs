use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use researchmind_core::traits::Embedder;
use researchmind_core::{Chunk, ChunkId, Error, Result, RetrievalResult, SourceType};
use researchmind_text::{rank, LexicalIndex};
use researchmind_vector::VectorStore;

use crate::fusion::{lexical_max, FusionConfig};

/// One fused hit with both component scores kept for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridHit {
    pub chunk: Chunk,
    pub dense_score: f32,
    pub lexical_score: f32,
    pub combined_score: f32,
}

impl From<HybridHit> for RetrievalResult {
    fn from(hit: HybridHit) -> Self {
        RetrievalResult {
            chunk_id: hit.chunk.chunk_id,
            source: format!("Uploaded Document (chunk {})", hit.chunk.chunk_id),
            text: hit.chunk.text,
            score: hit.combined_score,
            source_type: SourceType::Document,
        }
    }
}

/// A single user's document store: dense vectors, chunk metadata and the
/// lexical model derived from them.
///
/// Mutating calls (`index`, `clear`, `rebuild`) are not synchronised here;
/// callers serialise them per user.
pub struct HybridRetriever {
    store: VectorStore,
    lexical: Option<LexicalIndex>,
    fusion: FusionConfig,
}

impl HybridRetriever {
    pub fn new(dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>, fusion: FusionConfig) -> Self {
        Self { store: VectorStore::new(dir, embedder), lexical: None, fusion }
    }

    pub fn dir(&self) -> &Path { self.store.dir() }
    pub fn fusion(&self) -> &FusionConfig { &self.fusion }
    pub fn chunks(&self) -> &[Chunk] { self.store.chunks() }
    pub fn total_chunks(&self) -> usize { self.store.len() }
    pub fn is_ready(&self) -> bool { self.store.len() > 0 }

    /// First id that does not collide with anything stored.
    pub fn next_chunk_id(&self) -> ChunkId {
        self.store.chunks().iter().map(|c| c.chunk_id + 1).max().unwrap_or(0)
    }

    /// Appends `chunks` and rebuilds the lexical model over the full list.
    ///
    /// The new lexical model is built before the vector append, so a failure
    /// in either step leaves the previous state untouched.
    pub fn index(&mut self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() { return Ok(()); }
        let mut seen: HashSet<ChunkId> = self.store.chunks().iter().map(|c| c.chunk_id).collect();
        if let Some(dup) = chunks.iter().find(|c| !seen.insert(c.chunk_id)) {
            return Err(Error::InvalidInput(format!("chunk id {} is already indexed", dup.chunk_id)));
        }

        let mut all = self.store.chunks().to_vec();
        all.extend_from_slice(chunks);
        let lexical = LexicalIndex::build(&all)?;
        self.store.add(chunks)?;
        self.lexical = Some(lexical);
        info!(added = chunks.len(), total = self.store.len(), dir = %self.dir().display(), "indexed chunks");
        Ok(())
    }

    /// Fused top-`k` over the dense and lexical signals.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<HybridHit>> {
        if k == 0 || !self.is_ready() { return Ok(Vec::new()); }
        let window = self.fusion.window(k);

        let mut hits: Vec<HybridHit> = Vec::new();
        let mut by_id: HashMap<ChunkId, usize> = HashMap::new();
        for scored in self.store.search_text(query, window)? {
            by_id.insert(scored.chunk.chunk_id, hits.len());
            hits.push(HybridHit { chunk: scored.chunk, dense_score: scored.score, lexical_score: 0.0, combined_score: 0.0 });
        }

        if let Some(lexical) = &self.lexical {
            let scores = lexical.score(query)?;
            let max = lexical_max(&scores);
            for (position, raw) in rank(&scores, window) {
                let normalized = raw / max;
                let chunk = &self.store.chunks()[position];
                match by_id.get(&chunk.chunk_id) {
                    Some(&i) => hits[i].lexical_score = normalized,
                    None => {
                        by_id.insert(chunk.chunk_id, hits.len());
                        hits.push(HybridHit { chunk: chunk.clone(), dense_score: 0.0, lexical_score: normalized, combined_score: 0.0 });
                    }
                }
            }
        }

        for hit in &mut hits { hit.combined_score = self.fusion.combine(hit.dense_score, hit.lexical_score); }
        hits.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
        hits.truncate(k);
        debug!(k, window, returned = hits.len(), "hybrid search");
        Ok(hits)
    }

    pub fn search_results(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        Ok(self.search(query, k)?.into_iter().map(RetrievalResult::from).collect())
    }

    /// Restores the persisted pair and rebuilds the lexical model from it.
    /// Returns `false` when nothing was persisted yet.
    pub fn load_existing(&mut self) -> Result<bool> {
        self.lexical = None;
        if !self.store.load()? { return Ok(false); }
        self.lexical = Some(LexicalIndex::build(self.store.chunks())?);
        info!(chunks = self.store.len(), dir = %self.dir().display(), "loaded existing store");
        Ok(true)
    }

    pub fn save(&self) -> Result<()> { self.store.save() }

    /// Drops all chunks, the lexical model and the persisted files.
    pub fn clear(&mut self) -> Result<()> {
        self.lexical = None;
        self.store.clear()
    }

    /// Replaces the whole store with `chunks` and persists it.
    pub fn rebuild(&mut self, chunks: &[Chunk]) -> Result<()> {
        self.clear()?;
        self.index(chunks)?;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use researchmind_embed::FakeEmbedder;

    fn retriever(dir: &Path) -> HybridRetriever {
        HybridRetriever::new(dir, Arc::new(FakeEmbedder::new(64)), FusionConfig::default())
    }

    #[test]
    fn duplicate_ids_are_rejected_without_side_effects() {
        let tmp = tempfile::tempdir().unwrap();
        let mut r = retriever(tmp.path());
        r.index(&[Chunk::from_text(1, "alpha beta")]).unwrap();
        let err = r.index(&[Chunk::from_text(2, "gamma"), Chunk::from_text(1, "again")]);
        assert!(matches!(err, Err(Error::InvalidInput(_))));
        assert_eq!(r.total_chunks(), 1);
        assert!(matches!(r.index(&[Chunk::from_text(3, "x"), Chunk::from_text(3, "y")]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn lexical_model_covers_earlier_batches() {
        let tmp = tempfile::tempdir().unwrap();
        let mut r = retriever(tmp.path());
        r.index(&[Chunk::from_text(0, "adenosine receptor antagonist")]).unwrap();
        r.index(&[Chunk::from_text(1, "unrelated gardening notes")]).unwrap();
        let hits = r.search("adenosine", 2).unwrap();
        let first = hits.iter().find(|h| h.chunk.chunk_id == 0).unwrap();
        assert!((first.lexical_score - 1.0).abs() < 1e-6, "chunk from the first batch still scores lexically");
    }

    #[test]
    fn next_chunk_id_follows_the_largest() {
        let tmp = tempfile::tempdir().unwrap();
        let mut r = retriever(tmp.path());
        assert_eq!(r.next_chunk_id(), 0);
        r.index(&[Chunk::from_text(4, "a"), Chunk::from_text(2, "b")]).unwrap();
        assert_eq!(r.next_chunk_id(), 5);
    }

    #[test]
    fn lexical_only_candidates_enter_with_zero_dense_score() {
        let tmp = tempfile::tempdir().unwrap();
        let mut r = HybridRetriever::new(
            tmp.path(),
            Arc::new(FakeEmbedder::new(64)),
            FusionConfig::default().with_candidate_window(1),
        );
        let chunks: Vec<Chunk> = vec![
            Chunk::from_text(0, "melatonin timing"),
            Chunk::from_text(1, "melatonin melatonin supplements dosage guidance"),
        ];
        r.index(&chunks).unwrap();
        let hits = r.search("melatonin timing", 2).unwrap();
        assert!(hits.len() <= 2);
        for h in &hits {
            assert!(h.combined_score >= 0.0 && h.combined_score <= 1.0);
            assert!((h.combined_score - (0.6 * h.dense_score + 0.4 * h.lexical_score)).abs() < 1e-6);
        }
    }
}
