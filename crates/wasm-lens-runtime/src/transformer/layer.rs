//! Transformer layer implementation

use wasm_lens_core::error::Result;
use wasm_lens_cpu::layer_norm;

use super::{FeedForward, Hyperparameters, LayerWeights, MultiHeadAttention};

/// Output of one layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerOutput {
    /// [seq_len, d_model]
    pub hidden: Vec<f32>,
    /// [n_head, seq_len, seq_len]
    pub attention: Vec<f32>,
}

/// Post-norm block: `LN(x + attn(x))` then `LN(h + ffn(h))`
#[derive(Debug, Clone, Copy)]
pub struct TransformerLayer {
    attention: MultiHeadAttention,
    ffn: FeedForward,
    d_model: usize,
    eps: f32,
}

impl TransformerLayer {
    pub fn new(hyper: &Hyperparameters, eps: f32) -> Self {
        Self {
            attention: MultiHeadAttention::new(hyper),
            ffn: FeedForward::new(hyper),
            d_model: hyper.d_model,
            eps,
        }
    }

    pub fn forward(
        &self,
        hidden: &[f32],
        weights: &LayerWeights,
        seq_len: usize,
    ) -> Result<LayerOutput> {
        let attn = self.attention.forward(hidden, &weights.attention, seq_len)?;
        let hidden = self.residual_norm(hidden, &attn.output)?;

        let ffn = self.ffn.forward(&hidden, &weights.ffn, seq_len)?;
        let hidden = self.residual_norm(&hidden, &ffn)?;

        Ok(LayerOutput { hidden, attention: attn.weights })
    }

    /// Per-position `LayerNorm(x + delta)`
    fn residual_norm(&self, x: &[f32], delta: &[f32]) -> Result<Vec<f32>> {
        let sum: Vec<f32> = x.iter().zip(delta).map(|(a, b)| a + b).collect();
        let mut out = vec![0.0f32; sum.len()];
        for (src, dst) in sum.chunks_exact(self.d_model).zip(out.chunks_exact_mut(self.d_model)) {
            layer_norm(src, dst, self.eps)?;
        }
        Ok(out)
    }
}
