//! Multi-head causal self-attention

use wasm_lens_core::error::{Error, Result};
use wasm_lens_cpu::{matmul_f32, matmul_transposed, softmax, SoftmaxOutcome};

use super::{AttentionWeights, Hyperparameters};

/// Result of attending with a single head
#[derive(Debug, Clone, PartialEq)]
pub struct HeadAttention {
    /// [seq_len, d_head]
    pub output: Vec<f32>,
    /// Row-stochastic attention weights: [seq_len, seq_len]
    pub weights: Vec<f32>,
}

/// Scaled dot-product attention for one head with a causal mask.
///
/// `q`, `k` and `v` are `[seq_len, d_head]`. An optional `allowed` mask of
/// `[seq_len, seq_len]` further restricts which keys a query may see (`false`
/// blocks). Rows left with nothing to attend to become uniform.
pub fn scaled_dot_product_attention(
    q: &[f32],
    k: &[f32],
    v: &[f32],
    seq_len: usize,
    d_head: usize,
    allowed: Option<&[bool]>,
) -> Result<HeadAttention> {
    if let Some(mask) = allowed {
        if mask.len() != seq_len * seq_len {
            return Err(Error::InvalidShape(format!(
                "attention mask has {} entries, expected {}x{}",
                mask.len(),
                seq_len,
                seq_len
            )));
        }
    }

    if seq_len == 0 {
        return Ok(HeadAttention { output: Vec::new(), weights: Vec::new() });
    }

    let mut scores = vec![0.0f32; seq_len * seq_len];
    matmul_transposed(q, k, &mut scores, seq_len, d_head, seq_len)?;

    let scale = 1.0 / (d_head as f32).sqrt();
    let mut weights = vec![0.0f32; seq_len * seq_len];

    for (i, (score_row, weight_row)) in
        scores.chunks_exact_mut(seq_len).zip(weights.chunks_exact_mut(seq_len)).enumerate()
    {
        for (j, s) in score_row.iter_mut().enumerate() {
            let blocked = j > i || allowed.is_some_and(|m| !m[i * seq_len + j]);
            *s = if blocked { f32::NEG_INFINITY } else { *s * scale };
        }

        if softmax(score_row, weight_row)? == SoftmaxOutcome::Uniform {
            log::warn!("Attention row {} has no visible keys, using uniform weights", i);
        }
    }

    let mut output = vec![0.0f32; seq_len * d_head];
    matmul_f32(&weights, v, &mut output, seq_len, seq_len, d_head)?;

    Ok(HeadAttention { output, weights })
}

/// Attention output for a whole layer
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionOutput {
    /// Projected output: [seq_len, d_model]
    pub output: Vec<f32>,
    /// Per-head weights: [n_head, seq_len, seq_len]
    pub weights: Vec<f32>,
}

/// Multi-head attention layer
#[derive(Debug, Clone, Copy)]
pub struct MultiHeadAttention {
    d_model: usize,
    n_head: usize,
    d_head: usize,
}

impl MultiHeadAttention {
    pub fn new(hyper: &Hyperparameters) -> Self {
        Self { d_model: hyper.d_model, n_head: hyper.n_head, d_head: hyper.d_head }
    }

    /// Run every head over `hidden` ([seq_len, d_model]), concatenate and
    /// apply the output projection.
    pub fn forward(
        &self,
        hidden: &[f32],
        weights: &AttentionWeights,
        seq_len: usize,
    ) -> Result<AttentionOutput> {
        let head_dims = [self.n_head, self.d_model, self.d_head];
        weights.wq.expect_dims("wq", &head_dims)?;
        weights.wk.expect_dims("wk", &head_dims)?;
        weights.wv.expect_dims("wv", &head_dims)?;

        let attn_dim = self.n_head * self.d_head;
        let mut concat = vec![0.0f32; seq_len * attn_dim];
        let mut all_weights = Vec::with_capacity(self.n_head * seq_len * seq_len);

        let mut q = vec![0.0f32; seq_len * self.d_head];
        let mut k = vec![0.0f32; seq_len * self.d_head];
        let mut v = vec![0.0f32; seq_len * self.d_head];

        for h in 0..self.n_head {
            matmul_f32(hidden, weights.wq.outer(h), &mut q, seq_len, self.d_model, self.d_head)?;
            matmul_f32(hidden, weights.wk.outer(h), &mut k, seq_len, self.d_model, self.d_head)?;
            matmul_f32(hidden, weights.wv.outer(h), &mut v, seq_len, self.d_model, self.d_head)?;

            let head = scaled_dot_product_attention(&q, &k, &v, seq_len, self.d_head, None)?;

            for (dst, src) in
                concat.chunks_exact_mut(attn_dim).zip(head.output.chunks_exact(self.d_head))
            {
                dst[h * self.d_head..(h + 1) * self.d_head].copy_from_slice(src);
            }
            all_weights.extend_from_slice(&head.weights);
        }

        let mut output = vec![0.0f32; seq_len * self.d_model];
        matmul_f32(&concat, weights.wo.data(), &mut output, seq_len, attn_dim, self.d_model)?;

        Ok(AttentionOutput { output, weights: all_weights })
    }
}
