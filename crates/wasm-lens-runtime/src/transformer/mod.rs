//! Transformer architecture implementation
//!
//! Post-norm decoder blocks over synthetic weights, recording every
//! intermediate the visualizations need.

mod attention;
mod config;
mod ffn;
mod layer;
mod model;
mod weights;

pub use attention::{
    scaled_dot_product_attention, AttentionOutput, HeadAttention, MultiHeadAttention,
};
pub use config::{ForwardOptions, Hyperparameters};
pub use ffn::FeedForward;
pub use layer::{LayerOutput, TransformerLayer};
pub use model::{AttentionView, ForwardArtifacts, ForwardEngine, PassStats};
pub use weights::{AttentionWeights, FFNWeights, LayerWeights, Weights, DEFAULT_INIT_SCALE};
