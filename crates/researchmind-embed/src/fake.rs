use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use researchmind_core::traits::Embedder;
use researchmind_core::Result;

/// Deterministic hashed bag-of-words vectors for tests and offline runs.
///
/// Tokens are lower-cased whitespace splits, so texts sharing words land
/// close together and identical texts produce identical vectors.
#[derive(Debug, Clone)]
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }
}

impl Embedder for FakeEmbedder {
    fn dimension(&self) -> usize { self.dim }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        Ok(v)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}
