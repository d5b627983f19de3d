//! wasm-lens runtime
//!
//! Deterministic tiny-transformer forward pass with a full trace of its
//! intermediates, a sampler, a 2-D embedding projector and a worker boundary
//! that speaks JSON.

pub mod cache;
mod context;
pub mod projection;
pub mod sampling;
pub mod transformer;
pub mod worker;

#[cfg(target_arch = "wasm32")]
mod web;

pub use cache::{CacheKey, CacheStats, SharedWeightCache, WeightCache};
pub use context::RuntimeConfig;
pub use projection::{EmbeddingProjector, ProjectionMethod};
pub use sampling::TokenProbability;
pub use transformer::{
    ForwardArtifacts, ForwardEngine, ForwardOptions, Hyperparameters, Weights,
};
pub use worker::{ForwardRequest, ForwardResponse, Worker, WorkerHandle, WorkerMessage};

#[cfg(target_arch = "wasm32")]
pub use web::WasmWorker;

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
