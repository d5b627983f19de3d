//! Deterministic synthetic weights

use wasm_lens_core::error::Result;
use wasm_lens_core::{RandomSource, Tensor, VOCAB_SIZE};

use super::Hyperparameters;

/// Default standard deviation of every weight element
pub const DEFAULT_INIT_SCALE: f64 = 0.02;

/// Attention projections of one layer
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionWeights {
    /// Query projection: [n_head, d_model, d_head]
    pub wq: Tensor,
    /// Key projection: [n_head, d_model, d_head]
    pub wk: Tensor,
    /// Value projection: [n_head, d_model, d_head]
    pub wv: Tensor,
    /// Output projection: [n_head * d_head, d_model]
    pub wo: Tensor,
}

/// Feed-forward weights of one layer
#[derive(Debug, Clone, PartialEq)]
pub struct FFNWeights {
    /// [d_model, d_ff]
    pub w1: Tensor,
    /// [d_ff]
    pub b1: Tensor,
    /// [d_ff, d_model]
    pub w2: Tensor,
    /// [d_model]
    pub b2: Tensor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerWeights {
    pub attention: AttentionWeights,
    pub ffn: FFNWeights,
}

/// Complete weight set for one seed
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    pub hyper: Hyperparameters,
    pub seed: u32,
    /// [vocab, d_model]
    pub token_embeddings: Tensor,
    /// [seq_len, d_model]
    pub positional_embeddings: Tensor,
    pub layers: Vec<LayerWeights>,
    /// [d_model, vocab]
    pub lm_head: Tensor,
}

struct Initializer {
    rng: RandomSource,
    scale: f64,
}

impl Initializer {
    fn tensor(&mut self, dims: Vec<usize>) -> Result<Tensor> {
        let Self { rng, scale } = self;
        Tensor::from_fn(dims, || (rng.next_gaussian() * *scale) as f32)
    }
}

impl Weights {
    /// Build the weights for `seed` with the default scale of 0.02
    pub fn init(hyper: &Hyperparameters, seed: u32) -> Result<Self> {
        Self::init_with_scale(hyper, seed, DEFAULT_INIT_SCALE)
    }

    /// Build the weights for `seed`.
    ///
    /// Every element is `gaussian * scale` from one generator. Draw order:
    /// token embeddings, positional embeddings, then per layer Q, K, V (all
    /// heads each), output projection, w1, b1, w2, b2, and finally the LM head.
    pub fn init_with_scale(hyper: &Hyperparameters, seed: u32, scale: f64) -> Result<Self> {
        hyper.validate()?;

        let d_model = hyper.d_model;
        let d_ff = hyper.d_ff();
        let mut init = Initializer { rng: RandomSource::seed(seed), scale };

        let token_embeddings = init.tensor(vec![VOCAB_SIZE, d_model])?;
        let positional_embeddings = init.tensor(vec![hyper.seq_len, d_model])?;

        let mut layers = Vec::with_capacity(hyper.n_layer);
        for _ in 0..hyper.n_layer {
            let head_dims = vec![hyper.n_head, d_model, hyper.d_head];
            let attention = AttentionWeights {
                wq: init.tensor(head_dims.clone())?,
                wk: init.tensor(head_dims.clone())?,
                wv: init.tensor(head_dims)?,
                wo: init.tensor(vec![hyper.attn_dim(), d_model])?,
            };
            let ffn = FFNWeights {
                w1: init.tensor(vec![d_model, d_ff])?,
                b1: init.tensor(vec![d_ff])?,
                w2: init.tensor(vec![d_ff, d_model])?,
                b2: init.tensor(vec![d_model])?,
            };
            layers.push(LayerWeights { attention, ffn });
        }

        let lm_head = init.tensor(vec![d_model, VOCAB_SIZE])?;

        let weights = Self {
            hyper: *hyper,
            seed,
            token_embeddings,
            positional_embeddings,
            layers,
            lm_head,
        };
        log::info!(
            "Initialized weights: seed={} d_model={} n_layer={} n_head={} params={}",
            seed,
            d_model,
            hyper.n_layer,
            hyper.n_head,
            weights.parameter_count()
        );
        Ok(weights)
    }

    /// Number of stored weight elements
    pub fn parameter_count(&self) -> usize {
        let layers: usize = self
            .layers
            .iter()
            .map(|l| {
                l.attention.wq.len()
                    + l.attention.wk.len()
                    + l.attention.wv.len()
                    + l.attention.wo.len()
                    + l.ffn.w1.len()
                    + l.ffn.b1.len()
                    + l.ffn.w2.len()
                    + l.ffn.b2.len()
            })
            .sum();
        self.token_embeddings.len() + self.positional_embeddings.len() + layers + self.lm_head.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> Hyperparameters {
        Hyperparameters::new(8, 2, 4, 2, 6, 2)
    }

    #[test]
    fn test_shapes() {
        let w = Weights::init(&tiny(), 3).unwrap();
        assert_eq!(w.token_embeddings.dims(), &[100, 8]);
        assert_eq!(w.positional_embeddings.dims(), &[6, 8]);
        assert_eq!(w.layers.len(), 2);
        assert_eq!(w.layers[0].attention.wq.dims(), &[2, 8, 4]);
        assert_eq!(w.layers[0].attention.wo.dims(), &[8, 8]);
        assert_eq!(w.layers[1].ffn.w1.dims(), &[8, 16]);
        assert_eq!(w.layers[1].ffn.b1.dims(), &[16]);
        assert_eq!(w.layers[1].ffn.w2.dims(), &[16, 8]);
        assert_eq!(w.lm_head.dims(), &[8, 100]);
        assert_eq!(w.parameter_count(), tiny().parameter_count());
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = Weights::init(&tiny(), 11).unwrap();
        let b = Weights::init(&tiny(), 11).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, Weights::init(&tiny(), 12).unwrap());
    }

    #[test]
    fn test_draw_order_starts_with_token_embeddings() {
        let w = Weights::init(&tiny(), 5).unwrap();
        let mut rng = RandomSource::seed(5);
        let first = (rng.next_gaussian() * 0.02) as f32;
        let second = (rng.next_gaussian() * 0.02) as f32;
        assert_eq!(w.token_embeddings.data()[0], first);
        assert_eq!(w.token_embeddings.data()[1], second);
    }

    #[test]
    fn test_draw_order_q_before_k() {
        // all heads' Q come before any K, so the first K element is the draw
        // right after the last Q element
        let hyper = tiny();
        let w = Weights::init(&hyper, 8).unwrap();
        let mut rng = RandomSource::seed(8);
        let skip = (100 + hyper.seq_len) * hyper.d_model + hyper.n_head * hyper.d_model * hyper.d_head;
        for _ in 0..skip {
            rng.next_gaussian();
        }
        let expected = (rng.next_gaussian() * 0.02) as f32;
        assert_eq!(w.layers[0].attention.wk.data()[0], expected);
    }

    #[test]
    fn test_scale() {
        let w = Weights::init_with_scale(&tiny(), 1, 1.0).unwrap();
        let data = w.token_embeddings.data();
        let var = data.iter().map(|x| x * x).sum::<f32>() / data.len() as f32;
        assert!(var > 0.5 && var < 1.5, "variance {}", var);
    }

    #[test]
    fn test_invalid_hyperparameters() {
        let mut h = tiny();
        h.d_head = 0;
        assert!(Weights::init(&h, 1).is_err());
    }
}
