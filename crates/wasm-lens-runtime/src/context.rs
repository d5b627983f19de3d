use wasm_lens_core::error::{Error, Result};

use crate::transformer::{Hyperparameters, DEFAULT_INIT_SCALE};

const DEFAULT_LAYER_NORM_EPS: f32 = 1e-5;
const DEFAULT_MAX_SEQ_LEN: usize = 512;
const DEFAULT_MAX_PARAMETERS: usize = 16 * 1024 * 1024;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Standard deviation multiplier for synthetic weights
    pub init_scale: f64,
    pub layer_norm_eps: f32,
    /// Upper bound on `seq_len` accepted from a request
    pub max_seq_len: usize,
    /// Upper bound on the parameter count of a requested model
    pub max_parameters: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            init_scale: DEFAULT_INIT_SCALE,
            layer_norm_eps: DEFAULT_LAYER_NORM_EPS,
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
            max_parameters: DEFAULT_MAX_PARAMETERS,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::ParseError(format!("Invalid config JSON: {}", e)))
    }

    /// Reject configurations that cannot produce a usable forward pass
    pub fn validate(&self) -> Result<()> {
        if !self.init_scale.is_finite() || self.init_scale <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "init_scale must be finite and > 0, got {}",
                self.init_scale
            )));
        }
        if !self.layer_norm_eps.is_finite() || self.layer_norm_eps <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "layer_norm_eps must be finite and > 0, got {}",
                self.layer_norm_eps
            )));
        }
        Ok(())
    }

    /// Check a model against the configured limits
    pub fn check_limits(&self, hyper: &Hyperparameters) -> Result<()> {
        if hyper.seq_len > self.max_seq_len {
            return Err(Error::InvalidConfig(format!(
                "seq_len {} exceeds the limit of {}",
                hyper.seq_len, self.max_seq_len
            )));
        }
        let params = hyper.parameter_count();
        if params > self.max_parameters {
            return Err(Error::InvalidConfig(format!(
                "model has {} parameters, limit is {}",
                params, self.max_parameters
            )));
        }
        Ok(())
    }
}

impl serde::Serialize for RuntimeConfig {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("RuntimeConfig", 4)?;
        state.serialize_field("init_scale", &self.init_scale)?;
        state.serialize_field("layer_norm_eps", &self.layer_norm_eps)?;
        state.serialize_field("max_seq_len", &self.max_seq_len)?;
        state.serialize_field("max_parameters", &self.max_parameters)?;
        state.end()
    }
}

impl<'de> serde::Deserialize<'de> for RuntimeConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct ConfigHelper {
            init_scale: Option<f64>,
            layer_norm_eps: Option<f32>,
            max_seq_len: Option<usize>,
            max_parameters: Option<usize>,
        }

        let helper = ConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            init_scale: helper.init_scale.unwrap_or(DEFAULT_INIT_SCALE),
            layer_norm_eps: helper.layer_norm_eps.unwrap_or(DEFAULT_LAYER_NORM_EPS),
            max_seq_len: helper.max_seq_len.unwrap_or(DEFAULT_MAX_SEQ_LEN),
            max_parameters: helper.max_parameters.unwrap_or(DEFAULT_MAX_PARAMETERS),
        })
    }
}
