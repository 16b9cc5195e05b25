//! Seeded point generators.
//!
//! Every generator takes an explicit seed and uses ChaCha8, so a failing
//! property test can be replayed bit for bit.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Deterministic RNG for a seed.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// `n` points of dimension `dim` drawn uniformly from `[low, high)`.
pub fn uniform_points(n: usize, dim: usize, low: f64, high: f64, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = seeded_rng(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(low..high)).collect())
        .collect()
}

/// Points sampled from isotropic gaussian blobs, with the blob label kept.
#[derive(Debug, Clone)]
pub struct BlobStream {
    /// Blob centers.
    pub means: Vec<Vec<f64>>,
    /// Sampled points in stream order.
    pub points: Vec<Vec<f64>>,
    /// Index into `means` for each point.
    pub labels: Vec<usize>,
}

impl BlobStream {
    /// Number of points drawn from blob `label`.
    pub fn count(&self, label: usize) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }
}

/// `n` points, each from a uniformly chosen blob around one of `means`.
///
/// # Panics
///
/// Panics if `means` is empty or `std_dev` is not a valid standard deviation.
pub fn gaussian_blobs(means: &[Vec<f64>], std_dev: f64, n: usize, seed: u64) -> BlobStream {
    assert!(!means.is_empty(), "gaussian_blobs needs at least one mean");
    let mut rng = seeded_rng(seed);
    let noise = Normal::new(0.0, std_dev).expect("valid standard deviation");
    let labels_pool: Vec<usize> = (0..means.len()).collect();

    let mut points = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for _ in 0..n {
        let label = *labels_pool.choose(&mut rng).expect("non-empty pool");
        let point = means[label]
            .iter()
            .map(|m| m + noise.sample(&mut rng))
            .collect();
        points.push(point);
        labels.push(label);
    }

    BlobStream {
        means: means.to_vec(),
        points,
        labels,
    }
}

/// `n` gaussian points whose mean moves linearly from `start` to `end`.
///
/// # Panics
///
/// Panics on mismatched dimensions or an invalid `std_dev`.
pub fn drifting_stream(start: &[f64], end: &[f64], std_dev: f64, n: usize, seed: u64) -> Vec<Vec<f64>> {
    assert_eq!(start.len(), end.len(), "start and end must share a dimension");
    let mut rng = seeded_rng(seed);
    let noise = Normal::new(0.0, std_dev).expect("valid standard deviation");
    let steps = n.saturating_sub(1).max(1) as f64;

    (0..n)
        .map(|i| {
            let t = i as f64 / steps;
            start
                .iter()
                .zip(end)
                .map(|(s, e)| s + t * (e - s) + noise.sample(&mut rng))
                .collect()
        })
        .collect()
}
