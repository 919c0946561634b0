//! researchmind-embed
//!
//! Embedding providers: a candle BERT sentence embedder, a deterministic
//! hashed fake for tests, and a lazy wrapper that loads the real model on
//! first use.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use researchmind_core::config::{expand_path, EmbeddingSettings};
use researchmind_core::traits::Embedder;
use researchmind_core::{Error, Result};

pub mod device;
pub mod fake;
pub mod lazy;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use fake::FakeEmbedder;
pub use lazy::LazyEmbedder;
pub use model::BertEmbedder;
pub use pool::masked_mean_l2;

const DEFAULT_MODEL_DIR: &str = "models/all-MiniLM-L6-v2";

/// Builds the configured provider.
///
/// The fake embedder is used when `use_fake` is set or `APP_USE_FAKE_EMBEDDINGS`
/// is `1`/`true`; otherwise the BERT model is wrapped in a [`LazyEmbedder`]
/// so nothing heavy happens until the first embedding call.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let env_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if settings.use_fake || env_fake {
        info!(dimension = settings.fake_dimension, "using fake embedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.fake_dimension)));
    }

    let model_dir = resolve_model_dir(settings.model_dir.as_deref())?;
    let dimension = model::read_dimension(&model_dir).map_err(|e| Error::Embedding(e.to_string()))?;
    let (max_len, batch_size) = (settings.max_len, settings.batch_size);
    Ok(Arc::new(LazyEmbedder::new(dimension, move || {
        let model = BertEmbedder::load(&model_dir, max_len, batch_size).map_err(|e| Error::Embedding(e.to_string()))?;
        Ok(Arc::new(model) as Arc<dyn Embedder>)
    })))
}

/// Looks for the model directory in: the configured path, `APP_MODEL_DIR`,
/// `MODEL_DIR`, then `models/all-MiniLM-L6-v2` below the working directory.
pub fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    let candidates = configured
        .map(expand_path)
        .into_iter()
        .chain(std::env::var("APP_MODEL_DIR").ok().map(PathBuf::from))
        .chain(std::env::var("MODEL_DIR").ok().map(PathBuf::from))
        .chain(std::iter::once(Path::new(DEFAULT_MODEL_DIR).to_path_buf()));
    for dir in candidates {
        if dir.exists() {
            info!(dir = %dir.display(), "using model dir");
            return Ok(dir);
        }
    }
    Err(Error::NotFound("embedding model directory (set embedding.model_dir or APP_MODEL_DIR)".into()))
}
