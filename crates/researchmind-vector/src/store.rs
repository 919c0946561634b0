use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use tracing::{debug, info, warn};

use researchmind_core::traits::Embedder;
use researchmind_core::{Chunk, Error, Result};

use crate::index::{similarity, DenseIndex};

pub const INDEX_FILE: &str = "dense_index.safetensors";
pub const CHUNKS_FILE: &str = "chunks.json";
const VECTORS_TENSOR: &str = "vectors";

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub position: usize,
    pub chunk: Chunk,
    pub distance: f32,
    pub score: f32,
}

/// Dense vectors plus their chunk metadata, kept in the same order and
/// persisted together under one directory.
pub struct VectorStore {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    index: DenseIndex,
    chunks: Vec<Chunk>,
}

impl VectorStore {
    pub fn new(dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        let index = DenseIndex::new(embedder.dimension());
        Self { dir: dir.into(), embedder, index, chunks: Vec::new() }
    }

    pub fn dir(&self) -> &Path { &self.dir }
    pub fn dimension(&self) -> usize { self.index.dimension() }
    pub fn len(&self) -> usize { self.chunks.len() }
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }
    pub fn chunks(&self) -> &[Chunk] { &self.chunks }
    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }

    /// Embeds `chunks` in one batch and appends them. Nothing is appended if
    /// embedding fails.
    pub fn add(&mut self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() { return Ok(()); }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!("{} vectors for {} chunks", vectors.len(), chunks.len())));
        }
        self.index.add(&vectors)?;
        self.chunks.extend_from_slice(chunks);
        debug!(added = chunks.len(), total = self.chunks.len(), "vector store append");
        Ok(())
    }

    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let hits = self.index.search(query_vector, k)?;
        Ok(hits
            .into_iter()
            .map(|(position, distance)| ScoredChunk {
                position,
                chunk: self.chunks[position].clone(),
                distance,
                score: similarity(distance),
            })
            .collect())
    }

    /// Embeds `query` with the single-text form and searches.
    pub fn search_text(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if self.is_empty() || k == 0 { return Ok(Vec::new()); }
        let query_vector = self.embedder.embed(query)?;
        self.search(&query_vector, k)
    }

    /// Writes the index and chunk list as a pair. An empty store removes
    /// both files instead.
    pub fn save(&self) -> Result<()> {
        if self.is_empty() {
            self.remove_files()?;
            return Ok(());
        }
        fs::create_dir_all(&self.dir)?;
        let index_tmp = self.dir.join(format!("{INDEX_FILE}.tmp"));
        let chunks_tmp = self.dir.join(format!("{CHUNKS_FILE}.tmp"));

        let tensor = Tensor::from_slice(self.index.raw(), (self.index.len(), self.dimension()), &Device::Cpu)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        let tensors = HashMap::from([(VECTORS_TENSOR.to_string(), tensor)]);
        candle_core::safetensors::save(&tensors, &index_tmp).map_err(|e| Error::Persistence(e.to_string()))?;
        fs::write(&chunks_tmp, serde_json::to_vec(&self.chunks)?)?;

        fs::rename(&index_tmp, self.dir.join(INDEX_FILE))?;
        fs::rename(&chunks_tmp, self.dir.join(CHUNKS_FILE))?;
        info!(dir = %self.dir.display(), chunks = self.chunks.len(), "vector store saved");
        Ok(())
    }

    /// Restores the persisted pair. Returns `Ok(false)` and leaves the store
    /// empty when either file is missing.
    pub fn load(&mut self) -> Result<bool> {
        self.reset();
        let index_path = self.dir.join(INDEX_FILE);
        let chunks_path = self.dir.join(CHUNKS_FILE);
        if !index_path.is_file() || !chunks_path.is_file() {
            debug!(dir = %self.dir.display(), "no persisted vector store");
            return Ok(false);
        }

        let chunks: Vec<Chunk> = serde_json::from_slice(&fs::read(&chunks_path)?)?;
        let mut tensors = candle_core::safetensors::load(&index_path, &Device::Cpu)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        let tensor = tensors
            .remove(VECTORS_TENSOR)
            .ok_or_else(|| Error::Persistence(format!("{} has no '{VECTORS_TENSOR}' tensor", index_path.display())))?;
        let (rows, width) = tensor.dims2().map_err(|e| Error::Persistence(e.to_string()))?;
        if width != self.dimension() {
            return Err(Error::Persistence(format!("stored dimension {width} != embedder dimension {}", self.dimension())));
        }
        if rows != chunks.len() {
            warn!(rows, chunks = chunks.len(), "persisted index and metadata disagree");
            return Err(Error::Persistence(format!("index has {rows} vectors but metadata has {} chunks", chunks.len())));
        }
        let data: Vec<f32> = tensor
            .to_dtype(DType::F32)
            .and_then(|t| t.flatten_all())
            .and_then(|t| t.to_vec1())
            .map_err(|e| Error::Persistence(e.to_string()))?;

        self.index = DenseIndex::from_raw(width, data)?;
        self.chunks = chunks;
        info!(dir = %self.dir.display(), chunks = self.chunks.len(), "vector store loaded");
        Ok(true)
    }

    /// Empties the store (same dimension) and deletes the persisted pair.
    pub fn clear(&mut self) -> Result<()> {
        self.reset();
        self.remove_files()?;
        info!(dir = %self.dir.display(), "vector store cleared");
        Ok(())
    }

    fn reset(&mut self) {
        self.index = DenseIndex::new(self.embedder.dimension());
        self.chunks.clear();
    }

    fn remove_files(&self) -> Result<()> {
        for name in [INDEX_FILE, CHUNKS_FILE] {
            match fs::remove_file(self.dir.join(name)) {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    }
}
