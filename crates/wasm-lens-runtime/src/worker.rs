//! Request/response boundary
//!
//! A [`Worker`] owns the weight cache and turns [`ForwardRequest`]s into
//! [`ForwardResponse`]s. [`WorkerHandle`] runs one on a dedicated thread and
//! feeds it over a channel, so a UI thread never blocks on a forward pass.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use wasm_lens_core::error::{Error, Result};
use wasm_lens_core::RandomSource;

use crate::cache::{CacheKey, WeightCache};
use crate::context::RuntimeConfig;
use crate::projection::{EmbeddingProjector, ProjectionMethod};
use crate::transformer::{ForwardArtifacts, ForwardEngine, ForwardOptions, Hyperparameters};

/// One forward-pass request, as sent by the visualization front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    pub text: String,
    /// Overrides `hyper.seqLen` when present
    #[serde(default)]
    pub seq_len: Option<usize>,
    pub temperature: f32,
    pub top_k: usize,
    #[serde(default)]
    pub layer_view: usize,
    #[serde(default)]
    pub head_view: usize,
    /// Negative or out-of-range values are ignored
    #[serde(default)]
    pub mask_index: Option<i64>,
    /// Any JSON integer; wrapped to 32 bits
    #[serde(deserialize_with = "wrapping_seed")]
    pub seed: u32,
    #[serde(alias = "hyperparameters")]
    pub hyper: Hyperparameters,
    #[serde(default)]
    pub projection: Option<ProjectionMethod>,
}

/// Accept any integer seed and keep its low 32 bits, so `-1` and
/// `4294967295` name the same stream
fn wrapping_seed<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSeed {
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match RawSeed::deserialize(deserializer)? {
        RawSeed::Unsigned(seed) => seed as u32,
        RawSeed::Signed(seed) => seed as u32,
    })
}

impl ForwardRequest {
    /// Model shape with the request's sequence length applied
    pub fn hyperparameters(&self) -> Hyperparameters {
        let mut hyper = self.hyper;
        if let Some(seq_len) = self.seq_len {
            hyper.seq_len = seq_len;
        }
        hyper
    }

    pub fn options(&self) -> ForwardOptions {
        let mask_index = self.mask_index.and_then(|i| match usize::try_from(i) {
            Ok(index) => Some(index),
            Err(_) => {
                log::debug!("Ignoring negative mask index {}", i);
                None
            }
        });
        ForwardOptions {
            temperature: self.temperature,
            top_k: self.top_k,
            layer_view: self.layer_view,
            head_view: self.head_view,
            mask_index,
        }
    }
}

/// Artifacts on success, `{ "error": ... }` on failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForwardResponse {
    Failure { error: String },
    Success(Box<ForwardArtifacts>),
}

impl ForwardResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, ForwardResponse::Success(_))
    }

    pub fn into_result(self) -> Result<ForwardArtifacts> {
        match self {
            ForwardResponse::Success(artifacts) => Ok(*artifacts),
            ForwardResponse::Failure { error } => Err(Error::Runtime(error)),
        }
    }
}

impl From<Result<ForwardArtifacts>> for ForwardResponse {
    fn from(result: Result<ForwardArtifacts>) -> Self {
        match result {
            Ok(artifacts) => ForwardResponse::Success(Box::new(artifacts)),
            Err(e) => ForwardResponse::Failure { error: e.to_string() },
        }
    }
}

/// Serves forward requests against a single-entry weight cache
#[derive(Debug)]
pub struct Worker {
    config: RuntimeConfig,
    cache: WeightCache,
}

impl Worker {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, cache: WeightCache::new() })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn cache(&self) -> &WeightCache {
        &self.cache
    }

    /// Run one request
    pub fn handle(&mut self, request: &ForwardRequest) -> Result<ForwardArtifacts> {
        let hyper = request.hyperparameters();
        hyper.validate()?;
        self.config.check_limits(&hyper)?;
        let options = request.options();
        options.validate(&hyper)?;

        let key = CacheKey::new(request.seed, hyper, self.config.init_scale);
        let weights = self.cache.get_or_init(key)?;

        let engine = ForwardEngine::new(&weights, self.config.layer_norm_eps);
        let mut artifacts = engine.forward_text(&request.text, &options)?;

        if let Some(method) = request.projection {
            let rows: Vec<&[f32]> = artifacts.embeddings.outer_iter().collect();
            let mut rng = RandomSource::seed(request.seed);
            artifacts.projection = Some(EmbeddingProjector::new(method).project(&rows, &mut rng)?);
        }

        Ok(artifacts)
    }

    pub fn respond(&mut self, request: &ForwardRequest) -> ForwardResponse {
        self.handle(request).into()
    }

    /// JSON in, JSON out. Every failure, including malformed input, comes
    /// back as `{"error": ...}`.
    pub fn handle_json(&mut self, json: &str) -> String {
        let response = match serde_json::from_str::<ForwardRequest>(json) {
            Ok(request) => self.respond(&request),
            Err(e) => {
                let error = Error::ParseError(format!("Invalid request JSON: {}", e));
                ForwardResponse::Failure { error: error.to_string() }
            }
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("Failed to serialize response: {}", e) })
                .to_string()
        })
    }
}

/// Message accepted by a spawned worker
#[derive(Debug)]
pub enum WorkerMessage {
    Forward { request: ForwardRequest, reply: oneshot::Sender<ForwardResponse> },
    Shutdown,
}

/// Handle to a [`Worker`] running on its own thread.
///
/// Dropping the handle shuts the worker down and joins its thread.
#[derive(Debug)]
pub struct WorkerHandle {
    sender: mpsc::UnboundedSender<WorkerMessage>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn(config: RuntimeConfig) -> Result<Self> {
        let mut worker = Worker::new(config)?;
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name("wasm-lens-worker".to_string())
            .spawn(move || {
                while let Some(message) = receiver.blocking_recv() {
                    match message {
                        WorkerMessage::Forward { request, reply } => {
                            let response = worker.respond(&request);
                            if reply.send(response).is_err() {
                                log::debug!("Forward request abandoned by caller");
                            }
                        }
                        WorkerMessage::Shutdown => {
                            log::debug!("Forward worker shutting down");
                            break;
                        }
                    }
                }
            })
            .map_err(|e| Error::Runtime(format!("Failed to spawn worker thread: {}", e)))?;

        Ok(Self { sender, thread: Some(thread) })
    }

    fn enqueue(&self, request: ForwardRequest) -> Result<oneshot::Receiver<ForwardResponse>> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(WorkerMessage::Forward { request, reply })
            .map_err(|_| Error::Runtime("Forward worker has shut down".to_string()))?;
        Ok(receiver)
    }

    /// Submit a request and await the response
    pub async fn submit(&self, request: ForwardRequest) -> Result<ForwardResponse> {
        let receiver = self.enqueue(request)?;
        receiver.await.map_err(|_| Error::Runtime("Forward worker dropped the request".to_string()))
    }

    /// Submit a request and block the current thread for the response.
    ///
    /// Panics if called from inside an async runtime, like
    /// [`oneshot::Receiver::blocking_recv`].
    pub fn submit_blocking(&self, request: ForwardRequest) -> Result<ForwardResponse> {
        let receiver = self.enqueue(request)?;
        receiver
            .blocking_recv()
            .map_err(|_| Error::Runtime("Forward worker dropped the request".to_string()))
    }

    /// Stop the worker and wait for its thread to exit
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // the worker may already be gone
        let _ = self.sender.send(WorkerMessage::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("Forward worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(seed: u32) -> ForwardRequest {
        ForwardRequest {
            text: "ok".to_string(),
            seq_len: None,
            temperature: 1.0,
            top_k: 3,
            layer_view: 0,
            head_view: 0,
            mask_index: None,
            seed,
            hyper: Hyperparameters::new(8, 2, 4, 1, 6, 2),
            projection: None,
        }
    }

    #[test]
    fn test_seq_len_override() {
        let mut req = request(1);
        assert_eq!(req.hyperparameters().seq_len, 6);
        req.seq_len = Some(9);
        assert_eq!(req.hyperparameters().seq_len, 9);
    }

    #[test]
    fn test_seed_wraps_to_32_bits() {
        let parse = |seed: &str| {
            let json = format!(
                r#"{{"text":"ok","temperature":1.0,"topK":3,"seed":{},"hyper":{}}}"#,
                seed,
                serde_json::to_string(&Hyperparameters::default()).unwrap()
            );
            serde_json::from_str::<ForwardRequest>(&json).map(|r| r.seed)
        };
        assert_eq!(parse("-1").unwrap(), u32::MAX);
        assert_eq!(parse("4294967295").unwrap(), u32::MAX);
        assert_eq!(parse("4294967296").unwrap(), 0);
        assert_eq!(parse("1337").unwrap(), 1337);
        assert!(parse("1.5").is_err());
    }

    #[test]
    fn test_negative_mask_index_is_dropped() {
        let mut req = request(1);
        req.mask_index = Some(-1);
        assert_eq!(req.options().mask_index, None);
        req.mask_index = Some(2);
        assert_eq!(req.options().mask_index, Some(2));
    }

    #[test]
    fn test_handle_reuses_cache() {
        let mut worker = Worker::new(RuntimeConfig::default()).unwrap();
        worker.handle(&request(1)).unwrap();
        worker.handle(&request(1)).unwrap();
        worker.handle(&request(2)).unwrap();

        let stats = worker.cache().stats();
        assert_eq!(stats.builds, 2);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_limits_are_enforced() {
        let config = RuntimeConfig { max_seq_len: 4, ..Default::default() };
        let mut worker = Worker::new(config).unwrap();
        let err = worker.handle(&request(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_projection_attached_on_request() {
        let mut worker = Worker::new(RuntimeConfig::default()).unwrap();
        let mut req = request(3);
        req.projection = Some(ProjectionMethod::RandomDirections);

        let artifacts = worker.handle(&req).unwrap();

        assert_eq!(artifacts.projection.map(|p| p.len()), Some(6));
    }

    #[test]
    fn test_response_from_error() {
        let response: ForwardResponse = Err(Error::InvalidConfig("bad".into())).into();
        assert!(!response.is_success());
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"error":"Invalid configuration: bad"}"#
        );
    }
}
