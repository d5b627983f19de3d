//! Core primitives for wasm-lens
//!
//! This crate provides the leaf building blocks of the forward-pass engine:
//! - Fixed-shape tensor type
//! - Fixed-vocabulary character tokenizer
//! - Deterministic, explicitly threaded random source
//! - Shared error type

pub mod error;
pub mod rng;
pub mod tensor;
pub mod tokenizer;

pub use error::{Error, Result};
pub use rng::RandomSource;
pub use tensor::{Shape, Tensor};
pub use tokenizer::{SpecialTokens, Tokenizer, Vocabulary, VOCAB_SIZE};

/// Core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
