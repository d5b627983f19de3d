//! Next-token probabilities and ranking
//!
//! Temperature-scaled softmax over the final logits, a deterministic top-k
//! ranking for display, and weighted drawing from the ranked candidates for
//! callers that want to continue text.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use wasm_lens_core::error::{Error, Result};
use wasm_lens_core::Tokenizer;
use wasm_lens_cpu::softmax;

/// One ranked candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenProbability {
    pub token_id: u32,
    /// Display string of the token
    pub token: String,
    pub probability: f32,
}

fn check_temperature(temperature: f32) -> Result<()> {
    if !temperature.is_finite() || temperature <= 0.0 {
        return Err(Error::InvalidConfig(format!(
            "temperature must be finite and > 0, got {}",
            temperature
        )));
    }
    Ok(())
}

/// Full distribution of `softmax(logits / temperature)`.
///
/// Logits are shifted by their maximum before dividing, so the largest entry
/// is always `exp(0)` and a tiny temperature cannot overflow the scaled
/// values.
pub fn probabilities(logits: &[f32], temperature: f32) -> Result<Vec<f32>> {
    check_temperature(temperature)?;

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let scaled: Vec<f32> = logits.iter().map(|&x| (x - max) / temperature).collect();
    let mut probs = vec![0.0f32; scaled.len()];
    softmax(&scaled, &mut probs)?;
    Ok(probs)
}

/// Rank a distribution by probability (descending, ties by ascending id) and
/// keep the first `min(top_k, len)` entries
pub fn rank(probs: &[f32], top_k: usize) -> Vec<TokenProbability> {
    let tokenizer = Tokenizer::new();

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]).then(a.cmp(&b)));
    order.truncate(top_k);

    order
        .into_iter()
        .map(|id| TokenProbability {
            token_id: id as u32,
            token: tokenizer.token_str(id as u32).to_string(),
            probability: probs[id],
        })
        .collect()
}

/// Temperature-scaled top-k candidates for the next token
pub fn sample(logits: &[f32], temperature: f32, top_k: usize) -> Result<Vec<TokenProbability>> {
    let probs = probabilities(logits, temperature)?;
    Ok(rank(&probs, top_k))
}

/// Draw one token id from ranked candidates, proportionally to their
/// probabilities
pub fn draw<R: Rng + ?Sized>(ranked: &[TokenProbability], rng: &mut R) -> Result<u32> {
    let dist = WeightedIndex::new(ranked.iter().map(|t| t.probability))
        .map_err(|e| Error::Runtime(format!("Failed to create weighted index: {}", e)))?;
    Ok(ranked[dist.sample(rng)].token_id)
}

/// Shannon entropy in nats
pub fn entropy(probs: &[f32]) -> f32 {
    probs.iter().filter(|&&p| p > 0.0).map(|&p| -p * p.ln()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_lens_core::RandomSource;

    #[test]
    fn test_probabilities_sum_to_one() {
        let logits = vec![1.0, 2.0, 3.0, 0.5];
        let probs = probabilities(&logits, 0.7).unwrap();
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tiny_temperature_is_greedy() {
        let mut logits = vec![0.0f32; 100];
        logits[7] = 0.5;
        for t in [1e-30f32, 1e-39, 1e-44] {
            let top = sample(&logits, t, 1).unwrap();
            assert_eq!(top[0].token_id, 7, "temperature {}", t);
            assert_eq!(top[0].probability, 1.0, "temperature {}", t);
        }
    }

    #[test]
    fn test_invalid_temperature() {
        for t in [0.0, -0.5, f32::NAN, f32::INFINITY] {
            assert!(matches!(sample(&[1.0, 2.0], t, 1), Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_rank_order_and_ties() {
        let probs = vec![0.1, 0.3, 0.3, 0.2, 0.1];
        let ranked = rank(&probs, 10);

        let ids: Vec<u32> = ranked.iter().map(|t| t.token_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 0, 4]);
        assert_eq!(ranked[0].token, "<bos>");
    }

    #[test]
    fn test_top_k_truncates() {
        let logits: Vec<f32> = (0..100).map(|i| (i as f32 * 0.13).sin()).collect();
        assert_eq!(sample(&logits, 1.0, 5).unwrap().len(), 5);
        assert_eq!(sample(&logits, 1.0, 500).unwrap().len(), 100);
        assert!(sample(&logits, 1.0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_entropy() {
        assert_eq!(entropy(&[1.0, 0.0, 0.0]), 0.0);
        let uniform = entropy(&[0.25; 4]);
        assert!((uniform - 4.0f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_draw_respects_support() {
        let ranked = vec![
            TokenProbability { token_id: 40, token: "D".into(), probability: 0.0 },
            TokenProbability { token_id: 41, token: "E".into(), probability: 1.0 },
        ];
        let mut rng = RandomSource::seed(3);
        for _ in 0..20 {
            assert_eq!(draw(&ranked, &mut rng).unwrap(), 41);
        }
    }

    #[test]
    fn test_draw_is_reproducible() {
        let ranked = sample(&[0.5, 0.4, 0.3, 0.2, 0.1, 0.0], 1.0, 6).unwrap();
        let mut a = RandomSource::seed(77);
        let mut b = RandomSource::seed(77);
        let xs: Vec<u32> = (0..32).map(|_| draw(&ranked, &mut a).unwrap()).collect();
        let ys: Vec<u32> = (0..32).map(|_| draw(&ranked, &mut b).unwrap()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_draw_empty_is_error() {
        let mut rng = RandomSource::seed(1);
        assert!(matches!(draw(&[], &mut rng), Err(Error::Runtime(_))));
    }
}
