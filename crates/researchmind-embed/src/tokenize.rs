use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Tokenizes a batch, truncating to `max_len` and right-padding every row to
/// the longest sequence in the batch.
///
/// Returns `(input_ids, attention_mask)`, both `[B, T]` `u32` tensors.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[&str], max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let pad_id = tokenizer.get_padding().map_or(0, |p| p.pad_id);
    let seq_len = encodings.iter().map(|e| e.get_ids().len().min(max_len)).max().unwrap_or(0).max(1);

    let mut ids = Vec::with_capacity(texts.len() * seq_len);
    let mut mask = Vec::with_capacity(texts.len() * seq_len);
    for enc in &encodings {
        let n = enc.get_ids().len().min(max_len);
        ids.extend_from_slice(&enc.get_ids()[..n]);
        mask.extend_from_slice(&enc.get_attention_mask()[..n]);
        ids.extend(std::iter::repeat(pad_id).take(seq_len - n));
        mask.extend(std::iter::repeat(0u32).take(seq_len - n));
    }
    let input_ids = Tensor::from_vec(ids, (texts.len(), seq_len), device)?;
    let attention_mask = Tensor::from_vec(mask, (texts.len(), seq_len), device)?;
    Ok((input_ids, attention_mask))
}
