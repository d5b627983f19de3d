//! Single-entry weight cache
//!
//! Building weights is the expensive part of a request, and consecutive
//! requests almost always reuse the same seed. One entry is kept; a request
//! for anything else evicts it.

use std::sync::Arc;

use parking_lot::Mutex;
use wasm_lens_core::error::Result;

use crate::transformer::{Hyperparameters, Weights};

/// Everything the cached weights depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub seed: u32,
    pub hyper: Hyperparameters,
    init_scale_bits: u64,
}

impl CacheKey {
    pub fn new(seed: u32, hyper: Hyperparameters, init_scale: f64) -> Self {
        Self { seed, hyper, init_scale_bits: init_scale.to_bits() }
    }

    pub fn init_scale(&self) -> f64 {
        f64::from_bits(self.init_scale_bits)
    }
}

/// Hit/build counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub builds: u64,
}

/// Cache owned by a single worker
#[derive(Debug, Default)]
pub struct WeightCache {
    entry: Option<(CacheKey, Arc<Weights>)>,
    stats: CacheStats,
}

impl WeightCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the weights for `key`, building them on a miss
    pub fn get_or_init(&mut self, key: CacheKey) -> Result<Arc<Weights>> {
        if let Some((cached, weights)) = &self.entry {
            if *cached == key {
                self.stats.hits += 1;
                log::debug!("Weight cache hit for seed {}", key.seed);
                return Ok(Arc::clone(weights));
            }
            log::debug!("Evicting cached weights for seed {}", cached.seed);
        }

        let weights = Arc::new(Weights::init_with_scale(&key.hyper, key.seed, key.init_scale())?);
        self.entry = Some((key, Arc::clone(&weights)));
        self.stats.builds += 1;
        Ok(weights)
    }

    /// Key of the cached entry, if any
    pub fn current(&self) -> Option<&CacheKey> {
        self.entry.as_ref().map(|(key, _)| key)
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// [`WeightCache`] behind a lock, shareable across threads.
///
/// The lock is only held while looking up or building; callers get an
/// `Arc<Weights>` and run the forward pass without it.
#[derive(Debug, Clone, Default)]
pub struct SharedWeightCache {
    inner: Arc<Mutex<WeightCache>>,
}

impl SharedWeightCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_init(&self, key: CacheKey) -> Result<Arc<Weights>> {
        self.inner.lock().get_or_init(key)
    }

    pub fn current(&self) -> Option<CacheKey> {
        self.inner.lock().current().copied()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }
}
