//! Full forward pass and its recorded trace

use serde::{Deserialize, Serialize};
use wasm_lens_core::error::{Error, Result};
use wasm_lens_core::{Tensor, Tokenizer, VOCAB_SIZE};
use wasm_lens_cpu::matmul_f32;

use super::{ForwardOptions, Hyperparameters, TransformerLayer, Weights};
use crate::sampling::{self, TokenProbability};

/// Attention matrix selected for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionView {
    pub layer_view: usize,
    pub head_view: usize,
    /// [seq_len][seq_len]
    pub matrix: Vec<Vec<f32>>,
}

/// Size and cost of the model that produced the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassStats {
    pub parameter_count: usize,
    pub flops: u64,
}

/// Everything recorded during one forward pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardArtifacts {
    /// Ids actually fed to the model (after masking)
    pub token_ids: Vec<u32>,
    pub token_strings: Vec<String>,
    /// Token plus positional embedding: [seq_len, d_model]
    pub embeddings: Tensor,
    /// Positional rows that were added: [seq_len, d_model]
    pub positional: Tensor,
    /// Before layer 0 and after every layer: n_layer + 1 of [seq_len, d_model]
    pub hidden_states: Vec<Tensor>,
    /// [n_layer, n_head, seq_len, seq_len]
    pub attention: Tensor,
    /// Final-position logits: [vocab]
    pub logits: Vec<f32>,
    /// Temperature-scaled distribution over the vocabulary
    pub probabilities: Vec<f32>,
    pub top_tokens: Vec<TokenProbability>,
    pub view: AttentionView,
    pub stats: PassStats,
    /// 2-D layout of the embeddings, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<[f32; 2]>>,
}

impl ForwardArtifacts {
    /// Attention weights of one layer/head as a flat [seq_len, seq_len] slice
    pub fn attention_matrix(&self, layer: usize, head: usize) -> Option<&[f32]> {
        select_head(&self.attention, layer, head)
    }
}

fn select_head(attention: &Tensor, layer: usize, head: usize) -> Option<&[f32]> {
    let &[n_layer, n_head, seq_len, _] = attention.dims() else {
        return None;
    };
    if layer >= n_layer || head >= n_head {
        return None;
    }
    let size = seq_len * seq_len;
    let start = (layer * n_head + head) * size;
    attention.data().get(start..start + size)
}

/// Runs the forward pass against one immutable weight set
#[derive(Debug)]
pub struct ForwardEngine<'w> {
    weights: &'w Weights,
    layer: TransformerLayer,
    tokenizer: Tokenizer,
}

impl<'w> ForwardEngine<'w> {
    pub fn new(weights: &'w Weights, layer_norm_eps: f32) -> Self {
        Self {
            weights,
            layer: TransformerLayer::new(&weights.hyper, layer_norm_eps),
            tokenizer: Tokenizer::new(),
        }
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.weights.hyper
    }

    /// Encode `text` at the model's sequence length and run it
    pub fn forward_text(&self, text: &str, options: &ForwardOptions) -> Result<ForwardArtifacts> {
        let ids = self.tokenizer.encode(text, self.weights.hyper.seq_len);
        self.forward(&ids, options)
    }

    /// Run the model over exactly `seq_len` token ids
    pub fn forward(&self, token_ids: &[u32], options: &ForwardOptions) -> Result<ForwardArtifacts> {
        let hyper = &self.weights.hyper;
        hyper.validate()?;
        options.validate(hyper)?;

        let seq_len = hyper.seq_len;
        let d_model = hyper.d_model;
        if token_ids.len() != seq_len {
            return Err(Error::InvalidShape(format!(
                "expected {} token ids, got {}",
                seq_len,
                token_ids.len()
            )));
        }
        if let Some(&bad) = token_ids.iter().find(|&&id| id as usize >= VOCAB_SIZE) {
            return Err(Error::InvalidShape(format!(
                "token id {} is outside the vocabulary of {}",
                bad, VOCAB_SIZE
            )));
        }

        let mut ids = token_ids.to_vec();
        if let Some(index) = options.mask_index {
            if !self.tokenizer.apply_mask(&mut ids, index) {
                log::debug!("Ignoring mask index {} for sequence of {}", index, seq_len);
            }
        }

        let positional = self.weights.positional_embeddings.clone();
        positional.expect_dims("positional embeddings", &[seq_len, d_model])?;

        let mut hidden = Vec::with_capacity(seq_len * d_model);
        for (pos, &id) in ids.iter().enumerate() {
            let tok = self.weights.token_embeddings.outer(id as usize);
            hidden.extend(tok.iter().zip(positional.outer(pos)).map(|(t, p)| t + p));
        }
        let embeddings = Tensor::from_vec(vec![seq_len, d_model], hidden.clone())?;

        let mut hidden_states = Vec::with_capacity(hyper.n_layer + 1);
        hidden_states.push(embeddings.clone());
        let mut attention = Vec::with_capacity(hyper.n_layer * hyper.n_head * seq_len * seq_len);

        for layer_weights in &self.weights.layers {
            let out = self.layer.forward(&hidden, layer_weights, seq_len)?;
            attention.extend_from_slice(&out.attention);
            hidden = out.hidden;
            hidden_states.push(Tensor::from_vec(vec![seq_len, d_model], hidden.clone())?);
        }
        let attention =
            Tensor::from_vec(vec![hyper.n_layer, hyper.n_head, seq_len, seq_len], attention)?;

        let last = &hidden[(seq_len - 1) * d_model..];
        let mut logits = vec![0.0f32; VOCAB_SIZE];
        matmul_f32(last, self.weights.lm_head.data(), &mut logits, 1, d_model, VOCAB_SIZE)?;

        let probabilities = sampling::probabilities(&logits, options.temperature)?;
        let top_tokens = sampling::rank(&probabilities, options.top_k);

        let matrix: Vec<Vec<f32>> = select_head(&attention, options.layer_view, options.head_view)
            .map(|m| m.chunks_exact(seq_len).map(<[f32]>::to_vec).collect())
            .unwrap_or_default();

        Ok(ForwardArtifacts {
            token_strings: ids.iter().map(|&id| self.tokenizer.token_str(id).to_string()).collect(),
            token_ids: ids,
            embeddings,
            positional,
            hidden_states,
            attention,
            logits,
            probabilities,
            top_tokens,
            view: AttentionView {
                layer_view: options.layer_view,
                head_view: options.head_view,
                matrix,
            },
            stats: PassStats {
                parameter_count: self.weights.parameter_count(),
                flops: hyper.estimated_flops(),
            },
            projection: None,
        })
    }
}
