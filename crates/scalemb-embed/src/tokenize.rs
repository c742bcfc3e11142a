use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Encodes a batch, truncating to `max_len` and right-padding to the longest
/// sequence with `pad_id`. Returns `(input_ids, attention_mask)`, both `[B, T]`.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, pad_id: u32, device: &Device) -> Result<(Tensor, Tensor)> {
    let encodings = tokenizer.encode_batch(texts.to_vec(), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let seq_len = encodings.iter().map(|e| e.get_ids().len().min(max_len)).max().unwrap_or(0).max(1);
    let mut ids = Vec::with_capacity(texts.len() * seq_len);
    let mut mask = Vec::with_capacity(texts.len() * seq_len);
    for enc in &encodings {
        let mut row_ids = enc.get_ids().to_vec();
        let mut row_mask = enc.get_attention_mask().to_vec();
        if row_ids.len() > seq_len { row_ids.truncate(seq_len); row_mask.truncate(seq_len); }
        let pad = seq_len - row_ids.len();
        row_ids.extend(std::iter::repeat(pad_id).take(pad));
        row_mask.extend(std::iter::repeat(0).take(pad));
        ids.extend(row_ids);
        mask.extend(row_mask);
    }
    let input_ids = Tensor::from_iter(ids, device)?.reshape((encodings.len(), seq_len))?;
    let attention_mask = Tensor::from_iter(mask, device)?.reshape((encodings.len(), seq_len))?;
    Ok((input_ids, attention_mask))
}
