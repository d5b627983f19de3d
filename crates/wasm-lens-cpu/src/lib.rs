//! CPU kernels for wasm-lens
//!
//! Plain row-major f32 kernels. Every kernel is a deterministic sequential
//! loop so results are bit-identical from run to run.

pub mod gemm;
pub mod kernels;

pub use gemm::{matmul_f32, matmul_transposed};
pub use kernels::{add_bias, dot, gelu, layer_norm, softmax, SoftmaxOutcome};
