//! 2-D projection of embedding vectors for scatter plots

use serde::{Deserialize, Serialize};
use wasm_lens_core::error::{Error, Result};
use wasm_lens_core::RandomSource;

const POWER_ITERATIONS: usize = 64;

/// How projection axes are chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionMethod {
    /// Two random unit directions drawn from the caller's generator
    #[default]
    #[serde(rename = "random", alias = "randomDirections")]
    RandomDirections,
    /// Top two principal axes of the centered data
    Principal,
}

/// Projects `[n, d]` vectors onto two axes
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingProjector {
    method: ProjectionMethod,
}

impl EmbeddingProjector {
    pub fn new(method: ProjectionMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> ProjectionMethod {
        self.method
    }

    /// Mean-center the vectors and project each onto two axes.
    ///
    /// Empty input yields no points. Rows of differing length are a shape
    /// error.
    pub fn project<V: AsRef<[f32]>>(
        &self,
        vectors: &[V],
        rng: &mut RandomSource,
    ) -> Result<Vec<[f32; 2]>> {
        let Some(first) = vectors.first() else {
            return Ok(Vec::new());
        };
        let d = first.as_ref().len();
        if let Some((i, row)) = vectors.iter().enumerate().find(|(_, v)| v.as_ref().len() != d) {
            return Err(Error::InvalidShape(format!(
                "row {} has {} dimensions, expected {}",
                i,
                row.as_ref().len(),
                d
            )));
        }

        let centered = center(vectors, d);
        let (axis1, axis2) = match self.method {
            ProjectionMethod::RandomDirections => (random_direction(d, rng), random_direction(d, rng)),
            ProjectionMethod::Principal => principal_axes(&centered, d, rng),
        };

        Ok(centered
            .iter()
            .map(|row| [dot(row, &axis1) as f32, dot(row, &axis2) as f32])
            .collect())
    }
}

fn center<V: AsRef<[f32]>>(vectors: &[V], d: usize) -> Vec<Vec<f64>> {
    let n = vectors.len() as f64;
    let mut means = vec![0.0f64; d];
    for row in vectors {
        for (m, &x) in means.iter_mut().zip(row.as_ref()) {
            *m += x as f64;
        }
    }
    for m in &mut means {
        *m /= n;
    }

    vectors
        .iter()
        .map(|row| row.as_ref().iter().zip(&means).map(|(&x, m)| x as f64 - m).collect())
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale to unit length; a zero vector stays zero
fn normalize(v: &mut [f64]) {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn random_direction(d: usize, rng: &mut RandomSource) -> Vec<f64> {
    let mut v: Vec<f64> = (0..d).map(|_| rng.next() - 0.5).collect();
    normalize(&mut v);
    v
}

/// Covariance applied to `v` without materializing it: `Xᵀ(X v) / (n - 1)`
fn covariance_times(centered: &[Vec<f64>], v: &[f64], out: &mut [f64]) {
    let denom = centered.len().saturating_sub(1).max(1) as f64;
    out.fill(0.0);
    for row in centered {
        let weight = dot(row, v) / denom;
        for (o, &x) in out.iter_mut().zip(row) {
            *o += weight * x;
        }
    }
}

fn principal_axes(
    centered: &[Vec<f64>],
    d: usize,
    rng: &mut RandomSource,
) -> (Vec<f64>, Vec<f64>) {
    let (first, lambda) = power_iteration(centered, d, rng, None);
    let (second, _) = power_iteration(centered, d, rng, Some((first.as_slice(), lambda)));
    (first, second)
}

/// Dominant eigenpair of the covariance, optionally with one component
/// `(u, lambda)` deflated out
fn power_iteration(
    centered: &[Vec<f64>],
    d: usize,
    rng: &mut RandomSource,
    deflate: Option<(&[f64], f64)>,
) -> (Vec<f64>, f64) {
    let apply = |v: &[f64], out: &mut [f64]| {
        covariance_times(centered, v, out);
        if let Some((u, lambda)) = deflate {
            let along = lambda * dot(u, v);
            for (o, &x) in out.iter_mut().zip(u) {
                *o -= along * x;
            }
        }
    };

    let mut v = random_direction(d, rng);
    let mut next = vec![0.0f64; d];

    for _ in 0..POWER_ITERATIONS {
        apply(&v, &mut next);
        normalize(&mut next);
        std::mem::swap(&mut v, &mut next);
    }

    apply(&v, &mut next);
    let lambda = dot(&v, &next);
    (v, lambda)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let projector = EmbeddingProjector::default();
        let points = projector.project::<Vec<f32>>(&[], &mut RandomSource::seed(1)).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_ragged_input_is_error() {
        let projector = EmbeddingProjector::default();
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        let err = projector.project(&rows, &mut RandomSource::seed(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidShape(_)));
    }

    #[test]
    fn test_projection_is_centered() {
        let rows: Vec<Vec<f32>> =
            (0..6).map(|i| (0..4).map(|j| ((i * 4 + j) as f32).sin()).collect()).collect();
        let points =
            EmbeddingProjector::default().project(&rows, &mut RandomSource::seed(9)).unwrap();

        assert_eq!(points.len(), 6);
        let sx: f32 = points.iter().map(|p| p[0]).sum();
        let sy: f32 = points.iter().map(|p| p[1]).sum();
        assert!(sx.abs() < 1e-5 && sy.abs() < 1e-5);
    }

    #[test]
    fn test_random_directions_follow_the_generator() {
        let rows = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]];
        let projector = EmbeddingProjector::new(ProjectionMethod::RandomDirections);
        let a = projector.project(&rows, &mut RandomSource::seed(5)).unwrap();
        let b = projector.project(&rows, &mut RandomSource::seed(5)).unwrap();
        let c = projector.project(&rows, &mut RandomSource::seed(6)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_principal_axis_finds_dominant_direction() {
        // points spread along (1, 1, 0) with a little noise on the z axis
        let rows: Vec<Vec<f32>> = (0..10)
            .map(|i| {
                let t = i as f32 - 4.5;
                vec![t, t, if i % 2 == 0 { 0.1 } else { -0.1 }]
            })
            .collect();
        let projector = EmbeddingProjector::new(ProjectionMethod::Principal);
        let points = projector.project(&rows, &mut RandomSource::seed(2)).unwrap();

        // the first coordinate carries the spread of t * sqrt(2)
        let spread: f32 = points.iter().map(|p| p[0] * p[0]).sum::<f32>().sqrt();
        let expected: f32 = rows.iter().map(|r| 2.0 * r[0] * r[0]).sum::<f32>().sqrt();
        assert!((spread - expected).abs() < 1e-2, "{} vs {}", spread, expected);
        // the second axis only sees the small z noise
        assert!(points.iter().all(|p| p[1].abs() < 0.2));
    }

    #[test]
    fn test_single_dimension_rows() {
        let rows = vec![vec![1.0f32], vec![2.0], vec![4.0], vec![5.0]];
        for method in [ProjectionMethod::RandomDirections, ProjectionMethod::Principal] {
            let points =
                EmbeddingProjector::new(method).project(&rows, &mut RandomSource::seed(4)).unwrap();

            assert_eq!(points.len(), 4, "{:?}", method);
            // the only axis is +-1, so the first coordinate is the centered value
            for (p, expected) in points.iter().zip([-2.0f32, -1.0, 1.0, 2.0]) {
                assert!(p.iter().all(|x| x.is_finite()));
                assert!((p[0].abs() - expected.abs()).abs() < 1e-5, "{:?} {:?}", method, p);
            }
        }
    }

    #[test]
    fn test_principal_on_wide_rows() {
        // d far above n
        let d = 2048;
        let rows: Vec<Vec<f32>> = (0..5)
            .map(|i| (0..d).map(|j| ((i * 31 + j * 7) as f32 * 0.01).sin()).collect())
            .collect();
        let centered = center(&rows, d);
        let (a, b) = principal_axes(&centered, d, &mut RandomSource::seed(8));

        assert!((dot(&a, &a) - 1.0).abs() < 1e-9);
        assert!((dot(&b, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_method_wire_names() {
        let m: ProjectionMethod = serde_json::from_str("\"principal\"").unwrap();
        assert_eq!(m, ProjectionMethod::Principal);
        assert_eq!(serde_json::to_string(&ProjectionMethod::RandomDirections).unwrap(), "\"random\"");
    }
}
