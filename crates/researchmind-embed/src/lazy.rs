use std::sync::{Arc, Mutex};

use tracing::{error, info};

use researchmind_core::traits::Embedder;
use researchmind_core::{Error, Result};

type Loader = Box<dyn Fn() -> Result<Arc<dyn Embedder>> + Send + Sync>;

/// Defers model loading to the first embedding call.
///
/// The load runs at most once: concurrent first callers wait on the same
/// lock and reuse the loaded model. A failed load is returned to the caller
/// and not cached, so the next call tries again.
pub struct LazyEmbedder {
    dimension: usize,
    loader: Loader,
    slot: Mutex<Option<Arc<dyn Embedder>>>,
}

impl LazyEmbedder {
    /// `dimension` is the width the loaded model must report.
    pub fn new<F>(dimension: usize, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Embedder>> + Send + Sync + 'static,
    {
        Self { dimension, loader: Box::new(loader), slot: Mutex::new(None) }
    }

    pub fn is_loaded(&self) -> bool { self.slot.lock().map(|s| s.is_some()).unwrap_or(false) }

    fn get(&self) -> Result<Arc<dyn Embedder>> {
        let mut slot = self.slot.lock().map_err(|e| Error::poisoned("embedder", e))?;
        if let Some(model) = slot.as_ref() { return Ok(Arc::clone(model)); }
        let model = (self.loader)().map_err(|e| {
            error!(error = %e, "embedding model failed to load");
            e
        })?;
        if model.dimension() != self.dimension {
            return Err(Error::Embedding(format!(
                "loaded model has dimension {}, expected {}",
                model.dimension(),
                self.dimension
            )));
        }
        info!(dimension = self.dimension, "embedding model ready");
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }
}

impl Embedder for LazyEmbedder {
    fn dimension(&self) -> usize { self.dimension }
    fn embed(&self, text: &str) -> Result<Vec<f32>> { self.get()?.embed(text) }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { self.get()?.embed_batch(texts) }
}
