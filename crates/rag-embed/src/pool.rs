use anyhow::{ensure, Result};
use candle_core::Tensor;

/// Average of the token states where `attention_mask` is set, scaled to unit
/// length: `[batch, tokens, dim]` with a `[batch, tokens]` mask gives
/// `[batch, dim]`. A row with no unmasked tokens pools to zeros.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, tokens, dim) = hidden.dims3()?;
    ensure!(
        attention_mask.dims() == [batch, tokens],
        "attention mask {:?} does not match hidden states {:?}",
        attention_mask.dims(),
        hidden.dims()
    );
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
    let counts = mask.sum_keepdim(1)?.maximum(1f32)?;
    let mean = summed.broadcast_div(&counts)?;
    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(1e-12f32)?;
    let pooled = mean.broadcast_div(&norm)?;
    ensure!(pooled.dims() == [batch, dim], "unexpected pooled shape {:?}", pooled.dims());
    Ok(pooled)
}
