/// Element-wise and row-wise kernels (softmax, GELU, layer norm, bias)
use wasm_lens_core::error::{Error, Result};

/// How a softmax row was normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftmaxOutcome {
    /// Regular exp-normalize
    Normalized,
    /// Every entry was masked (or non-finite); the row became uniform
    Uniform,
}

fn check_same_len(input: &[f32], output: &[f32]) -> Result<()> {
    if input.len() != output.len() {
        return Err(Error::InvalidShape(format!(
            "input has {} elements, output has {}",
            input.len(),
            output.len()
        )));
    }
    Ok(())
}

/// Dot product of two equal-length vectors, accumulated left to right
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).fold(0.0f32, |acc, (&x, &y)| acc + x * y)
}

/// Numerically stable softmax: `output[i] = exp(input[i] - max) / sum`.
///
/// Entries equal to `-inf` receive exactly zero weight. A row whose maximum is
/// not finite (all masked, or NaN) falls back to a uniform distribution.
pub fn softmax(input: &[f32], output: &mut [f32]) -> Result<SoftmaxOutcome> {
    check_same_len(input, output)?;
    if input.is_empty() {
        return Ok(SoftmaxOutcome::Normalized);
    }

    let max = input.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() || input.iter().any(|x| x.is_nan()) {
        output.fill(1.0 / input.len() as f32);
        return Ok(SoftmaxOutcome::Uniform);
    }

    let mut sum = 0.0f32;
    for (out, &x) in output.iter_mut().zip(input) {
        let e = (x - max).exp();
        *out = e;
        sum += e;
    }

    if !sum.is_finite() || sum <= 0.0 {
        output.fill(1.0 / input.len() as f32);
        return Ok(SoftmaxOutcome::Uniform);
    }

    for out in output.iter_mut() {
        *out /= sum;
    }

    Ok(SoftmaxOutcome::Normalized)
}

/// GELU activation (tanh approximation):
/// `0.5 * x * (1 + tanh(sqrt(2/π) * (x + 0.044715 * x³)))`
pub fn gelu(input: &[f32], output: &mut [f32]) -> Result<()> {
    check_same_len(input, output)?;

    const SQRT_2_OVER_PI: f32 = 0.797_884_6;
    const COEFF: f32 = 0.044_715;

    for (out, &x) in output.iter_mut().zip(input) {
        let inner = SQRT_2_OVER_PI * (x + COEFF * x * x * x);
        *out = 0.5 * x * (1.0 + inner.tanh());
    }

    Ok(())
}

/// Layer normalization without learned scale or shift:
/// `(x - mean) / sqrt(variance + eps)`
pub fn layer_norm(input: &[f32], output: &mut [f32], eps: f32) -> Result<()> {
    check_same_len(input, output)?;
    if input.is_empty() {
        return Ok(());
    }

    let n = input.len() as f32;
    let mean = input.iter().sum::<f32>() / n;
    let variance = input.iter().map(|&x| (x - mean) * (x - mean)).sum::<f32>() / n;
    let std = (variance + eps).sqrt();

    for (out, &x) in output.iter_mut().zip(input) {
        *out = (x - mean) / std;
    }

    Ok(())
}

/// Add `bias` to every row of a row-major `[rows, bias.len()]` matrix
pub fn add_bias(matrix: &mut [f32], bias: &[f32]) -> Result<()> {
    if bias.is_empty() || matrix.len() % bias.len() != 0 {
        return Err(Error::InvalidShape(format!(
            "bias of length {} does not tile a matrix of {} elements",
            bias.len(),
            matrix.len()
        )));
    }

    for row in matrix.chunks_exact_mut(bias.len()) {
        for (x, &b) in row.iter_mut().zip(bias) {
            *x += b;
        }
    }

    Ok(())
}
