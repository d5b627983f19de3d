/// General matrix multiply (GEMM) kernels
///
/// Row-major f32 only. Accumulation order is fixed (ascending inner index),
/// which keeps the forward pass reproducible bit for bit.
use wasm_lens_core::error::{Error, Result};

fn check_len(name: &str, actual: usize, rows: usize, cols: usize) -> Result<()> {
    if actual != rows * cols {
        return Err(Error::InvalidShape(format!(
            "Matrix {} size mismatch: expected {}x{}={}, got {}",
            name,
            rows,
            cols,
            rows * cols,
            actual
        )));
    }
    Ok(())
}

/// Matrix multiplication: C = A * B
///
/// A: [M, K]
/// B: [K, N]
/// C: [M, N]
pub fn matmul_f32(a: &[f32], b: &[f32], c: &mut [f32], m: usize, k: usize, n: usize) -> Result<()> {
    check_len("A", a.len(), m, k)?;
    check_len("B", b.len(), k, n)?;
    check_len("C", c.len(), m, n)?;
    if c.is_empty() {
        return Ok(());
    }
    if k == 0 {
        c.fill(0.0);
        return Ok(());
    }

    for (a_row, c_row) in a.chunks_exact(k).zip(c.chunks_exact_mut(n)) {
        for (j, out) in c_row.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for (l, &a_val) in a_row.iter().enumerate() {
                sum += a_val * b[l * n + j];
            }
            *out = sum;
        }
    }

    Ok(())
}

/// Matrix multiplication with transposed B: C = A * B^T
///
/// A: [M, K]
/// B: [N, K] (accessed as transposed)
/// C: [M, N]
///
/// Used for attention scores, where both operands are stored one vector per
/// row.
pub fn matmul_transposed(
    a: &[f32],
    b_t: &[f32],
    c: &mut [f32],
    m: usize,
    k: usize,
    n: usize,
) -> Result<()> {
    check_len("A", a.len(), m, k)?;
    check_len("B^T", b_t.len(), n, k)?;
    check_len("C", c.len(), m, n)?;
    if c.is_empty() {
        return Ok(());
    }
    if k == 0 {
        c.fill(0.0);
        return Ok(());
    }

    for (a_row, c_row) in a.chunks_exact(k).zip(c.chunks_exact_mut(n)) {
        for (b_row, out) in b_t.chunks_exact(k).zip(c_row.iter_mut()) {
            *out = crate::kernels::dot(a_row, b_row);
        }
    }

    Ok(())
}
