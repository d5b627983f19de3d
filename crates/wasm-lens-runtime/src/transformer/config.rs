//! Model hyperparameters and per-pass options

use serde::{Deserialize, Serialize};
use wasm_lens_core::error::{Error, Result};
use wasm_lens_core::VOCAB_SIZE;

/// Shape of the synthetic transformer
///
/// `n_head * d_head` does not have to equal `d_model`; the output projection
/// maps the concatenated heads back to `d_model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Hidden dimension
    pub d_model: usize,
    /// Number of attention heads
    pub n_head: usize,
    /// Per-head dimension
    pub d_head: usize,
    /// Number of transformer layers
    pub n_layer: usize,
    /// Fixed sequence length of one forward pass
    #[serde(rename = "seqLen", alias = "seq_len")]
    pub seq_len: usize,
    /// FFN hidden size as a multiple of `d_model`
    pub ffn_mult: usize,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self { d_model: 64, n_head: 4, d_head: 16, n_layer: 2, seq_len: 16, ffn_mult: 2 }
    }
}

impl Hyperparameters {
    pub fn new(
        d_model: usize,
        n_head: usize,
        d_head: usize,
        n_layer: usize,
        seq_len: usize,
        ffn_mult: usize,
    ) -> Self {
        Self { d_model, n_head, d_head, n_layer, seq_len, ffn_mult }
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("d_model", self.d_model),
            ("n_head", self.n_head),
            ("d_head", self.d_head),
            ("n_layer", self.n_layer),
            ("seq_len", self.seq_len),
            ("ffn_mult", self.ffn_mult),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be > 0", name)));
            }
        }
        Ok(())
    }

    /// Width of the concatenated attention heads
    pub fn attn_dim(&self) -> usize {
        self.n_head.saturating_mul(self.d_head)
    }

    /// FFN hidden size
    pub fn d_ff(&self) -> usize {
        self.d_model.saturating_mul(self.ffn_mult)
    }

    pub fn vocab_size(&self) -> usize {
        VOCAB_SIZE
    }

    /// Total number of weight elements. Saturates instead of overflowing so
    /// absurd requests can be rejected by a limit check.
    pub fn parameter_count(&self) -> usize {
        let d = self.d_model;
        let attn = self.attn_dim();
        let ff = self.d_ff();

        let per_layer = [
            attn.saturating_mul(d).saturating_mul(3),
            attn.saturating_mul(d),
            d.saturating_mul(ff),
            ff,
            ff.saturating_mul(d),
            d,
        ]
        .into_iter()
        .fold(0usize, usize::saturating_add);

        VOCAB_SIZE
            .saturating_mul(d)
            .saturating_add(self.seq_len.saturating_mul(d))
            .saturating_add(per_layer.saturating_mul(self.n_layer))
            .saturating_add(d.saturating_mul(VOCAB_SIZE))
    }

    /// Multiply-add count of one forward pass, two flops per multiply-add
    pub fn estimated_flops(&self) -> u64 {
        let s = self.seq_len as u64;
        let d = self.d_model as u64;
        let h = self.n_head as u64;
        let dh = self.d_head as u64;
        let ff = self.d_ff() as u64;
        let v = VOCAB_SIZE as u64;

        let qkv = 3 * s * d * h * dh;
        let scores = h * s * s * dh;
        let mix = h * s * s * dh;
        let out = s * h * dh * d;
        let ffn = 2 * s * d * ff;
        let per_layer = qkv + scores + mix + out + ffn;

        2u64.saturating_mul(per_layer.saturating_mul(self.n_layer as u64).saturating_add(d * v))
    }
}

/// Options for one forward pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardOptions {
    /// Softmax temperature for the next-token distribution
    pub temperature: f32,
    /// Number of ranked candidates to return
    pub top_k: usize,
    /// Layer whose attention matrix is selected for display
    pub layer_view: usize,
    /// Head whose attention matrix is selected for display
    pub head_view: usize,
    /// Position replaced by MASK before embedding
    pub mask_index: Option<usize>,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self { temperature: 0.7, top_k: 40, layer_view: 0, head_view: 0, mask_index: None }
    }
}

impl ForwardOptions {
    /// Check the options against a model
    pub fn validate(&self, hyper: &Hyperparameters) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "temperature must be finite and > 0, got {}",
                self.temperature
            )));
        }
        if self.layer_view >= hyper.n_layer {
            return Err(Error::InvalidConfig(format!(
                "layer_view {} out of range for {} layers",
                self.layer_view, hyper.n_layer
            )));
        }
        if self.head_view >= hyper.n_head {
            return Err(Error::InvalidConfig(format!(
                "head_view {} out of range for {} heads",
                self.head_view, hyper.n_head
            )));
        }
        Ok(())
    }
}
