use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use researchmind_core::traits::Embedder;
use researchmind_core::Error;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch;

/// Sentence embedder over a local BERT checkpoint
/// (`tokenizer.json`, `config.json`, `model.safetensors`).
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
    max_len: usize,
    batch_size: usize,
}

impl BertEmbedder {
    pub fn load(model_dir: &Path, max_len: usize, batch_size: usize) -> Result<Self> {
        let started = Instant::now();
        let device = select_device();
        info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config = read_config(model_dir)?;

        let weights_path = model_dir.join("model.safetensors");
        let weights = candle_core::safetensors::load(&weights_path, &device)
            .with_context(|| format!("Failed to read weights from {}", weights_path.display()))?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config).context("Failed to initialize BERT model from weights")?;

        info!(
            layers = config.num_hidden_layers,
            hidden = config.hidden_size,
            ms = started.elapsed().as_millis() as u64,
            "embedding model loaded"
        );
        Ok(Self { model, tokenizer, device, dimension: config.hidden_size, max_len, batch_size: batch_size.max(1) })
    }

    fn embed_slice(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        Ok(rows)
    }
}

/// Reads `hidden_size` from the checkpoint config without loading weights.
pub fn read_dimension(model_dir: &Path) -> Result<usize> { Ok(read_config(model_dir)?.hidden_size) }

fn read_config(model_dir: &Path) -> Result<BertConfig> {
    let config_path = model_dir.join("config.json");
    let raw = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    serde_json::from_str(&raw).context("Failed to parse BERT config")
}

impl Embedder for BertEmbedder {
    fn dimension(&self) -> usize { self.dimension }

    fn embed(&self, text: &str) -> researchmind_core::Result<Vec<f32>> {
        let started = Instant::now();
        let mut rows = self.embed_slice(&[text]).map_err(|e| Error::Embedding(e.to_string()))?;
        if started.elapsed().as_millis() > 100 { warn!(ms = started.elapsed().as_millis() as u64, "slow query embedding"); }
        rows.pop().ok_or_else(|| Error::Embedding("model returned no rows".into()))
    }

    fn embed_batch(&self, texts: &[String]) -> researchmind_core::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
            let rows = self.embed_slice(&refs).map_err(|e| Error::Embedding(e.to_string()))?;
            out.extend(rows);
        }
        debug!(texts = texts.len(), "embedded batch");
        Ok(out)
    }
}
