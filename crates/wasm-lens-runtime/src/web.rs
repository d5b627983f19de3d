//! WebAssembly bindings for browser usage
#![cfg(target_arch = "wasm32")]

use wasm_bindgen::prelude::*;
use wasm_lens_core::Tokenizer;

use crate::{RuntimeConfig, Worker};

/// JavaScript-facing forward worker, meant to live inside a Web Worker
#[wasm_bindgen]
pub struct WasmWorker {
    worker: Worker,
}

#[wasm_bindgen]
impl WasmWorker {
    /// Create a worker with the default runtime configuration
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WasmWorker, JsValue> {
        Self::with_config("{}")
    }

    /// Create a worker from a JSON runtime configuration
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(config_json: &str) -> Result<WasmWorker, JsValue> {
        let config = RuntimeConfig::from_json(config_json)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let worker = Worker::new(config).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmWorker { worker })
    }

    /// Run one request; the result is the artifacts or `{"error": ...}` as JSON
    pub fn forward(&mut self, request_json: &str) -> String {
        self.worker.handle_json(request_json)
    }
}

/// Encode text with the fixed vocabulary
#[wasm_bindgen]
pub fn encode(text: &str, seq_len: usize) -> Vec<u32> {
    Tokenizer::new().encode(text, seq_len)
}

/// Decode ids with the fixed vocabulary
#[wasm_bindgen]
pub fn decode(token_ids: &[u32]) -> String {
    Tokenizer::new().decode(token_ids)
}

#[wasm_bindgen]
pub fn version() -> String {
    crate::VERSION.to_string()
}
