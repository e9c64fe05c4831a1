use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use tokenizers::{Encoding, Tokenizer};

const PAD_ID: u32 = 1;

/// Single text padded to exactly `max_len` tokens; returns `(input_ids, attention_mask)` of shape `[1, max_len]`.
pub fn tokenize_on_device(tokenizer: &Tokenizer, text: &str, max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let enc = tokenizer.encode(text, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    to_tensors(&enc, max_len, true, device)
}

/// `(query, passage)` pair in cross-encoder layout, truncated to `max_len` but not padded.
pub fn tokenize_pair_on_device(tokenizer: &Tokenizer, query: &str, passage: &str, max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let enc = tokenizer.encode((query, passage), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    to_tensors(&enc, max_len, false, device)
}

fn to_tensors(enc: &Encoding, max_len: usize, pad: bool, device: &Device) -> Result<(Tensor, Tensor)> {
    let mut ids = enc.get_ids().to_vec();
    let mut mask = enc.get_attention_mask().to_vec();
    if ids.len() > max_len { ids.truncate(max_len); mask.truncate(max_len); }
    if pad && ids.len() < max_len { let pad = max_len - ids.len(); ids.extend(std::iter::repeat(PAD_ID).take(pad)); mask.extend(std::iter::repeat(0).take(pad)); }
    let len = ids.len();
    let input_ids = Tensor::from_iter(ids, device)?.reshape((1, len))?;
    let attention_mask = Tensor::from_iter(mask, device)?.reshape((1, len))?;
    Ok((input_ids, attention_mask))
}
