//! Position-wise feed-forward network

use wasm_lens_core::error::Result;
use wasm_lens_cpu::{add_bias, gelu, matmul_f32};

use super::{FFNWeights, Hyperparameters};

/// `W2 · GELU(W1·x + b1) + b2`, applied to every position independently
#[derive(Debug, Clone, Copy)]
pub struct FeedForward {
    d_model: usize,
    d_ff: usize,
}

impl FeedForward {
    pub fn new(hyper: &Hyperparameters) -> Self {
        Self { d_model: hyper.d_model, d_ff: hyper.d_ff() }
    }

    /// `hidden` is [seq_len, d_model]; returns [seq_len, d_model]
    pub fn forward(&self, hidden: &[f32], weights: &FFNWeights, seq_len: usize) -> Result<Vec<f32>> {
        weights.b1.expect_dims("b1", &[self.d_ff])?;
        weights.b2.expect_dims("b2", &[self.d_model])?;

        let mut inner = vec![0.0f32; seq_len * self.d_ff];
        matmul_f32(hidden, weights.w1.data(), &mut inner, seq_len, self.d_model, self.d_ff)?;
        add_bias(&mut inner, weights.b1.data())?;

        let mut activated = vec![0.0f32; inner.len()];
        gelu(&inner, &mut activated)?;

        let mut output = vec![0.0f32; seq_len * self.d_model];
        matmul_f32(&activated, weights.w2.data(), &mut output, seq_len, self.d_ff, self.d_model)?;
        add_bias(&mut output, weights.b2.data())?;

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_lens_core::Tensor;

    #[test]
    fn test_zero_weights_return_output_bias() {
        let hyper = Hyperparameters::new(2, 1, 2, 1, 3, 2);
        let weights = FFNWeights {
            w1: Tensor::zeros(vec![2, 4]).unwrap(),
            b1: Tensor::zeros(vec![4]).unwrap(),
            w2: Tensor::zeros(vec![4, 2]).unwrap(),
            b2: Tensor::from_vec(vec![2], vec![0.25, -0.5]).unwrap(),
        };

        let out = FeedForward::new(&hyper).forward(&[1.0; 6], &weights, 3).unwrap();

        assert_eq!(out, vec![0.25, -0.5, 0.25, -0.5, 0.25, -0.5]);
    }

    #[test]
    fn test_biases_are_per_element() {
        // identity-like w1/w2 make the bias contribution visible per column
        let hyper = Hyperparameters::new(2, 1, 2, 1, 1, 1);
        let weights = FFNWeights {
            w1: Tensor::from_vec(vec![2, 2], vec![1.0, 0.0, 0.0, 1.0]).unwrap(),
            b1: Tensor::from_vec(vec![2], vec![1.0, 2.0]).unwrap(),
            w2: Tensor::from_vec(vec![2, 2], vec![1.0, 0.0, 0.0, 1.0]).unwrap(),
            b2: Tensor::from_vec(vec![2], vec![0.0, 10.0]).unwrap(),
        };

        let out = FeedForward::new(&hyper).forward(&[0.0, 0.0], &weights, 1).unwrap();

        // gelu(1) ~ 0.8412, gelu(2) ~ 1.9546
        assert!((out[0] - 0.8412).abs() < 1e-3);
        assert!((out[1] - 11.9546).abs() < 1e-3);
    }
}
