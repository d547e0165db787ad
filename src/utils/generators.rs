//! Seeded generators for symmetric, diagonally dominant test matrices.

use faer::Mat;
use rand::{Rng, seq::SliceRandom};

/// Draws a diagonal entry `1 + U{0..999} / 10`, i.e. a value in `[1, 100.9]`.
pub fn random_diagonal_entry<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    1.0 + f64::from(rng.random_range(0..1000u32)) / 10.0
}

/// Builds `D + eps (R + R^T)` where `D = diag(diagonal)` and `R` has entries
/// drawn uniformly from `[-1, 1)`.
pub fn perturbed_diagonal<R: Rng + ?Sized>(diagonal: &[f64], eps: f64, rng: &mut R) -> Mat<f64> {
    let n = diagonal.len();
    let noise = Mat::from_fn(n, n, |_, _| rng.random_range(-1.0..1.0));
    Mat::from_fn(n, n, |i, j| {
        if i == j {
            diagonal[i]
        } else {
            eps * (noise[(i, j)] + noise[(j, i)])
        }
    })
}

/// A random dense symmetric matrix with diagonal entries `1 + U{0..999} / 10` and
/// off-diagonal entries of magnitude at most `2 eps`.
pub fn random_dense_operator<R: Rng + ?Sized>(n: usize, eps: f64, rng: &mut R) -> Mat<f64> {
    let diagonal: Vec<f64> = (0..n).map(|_| random_diagonal_entry(rng)).collect();
    perturbed_diagonal(&diagonal, eps, rng)
}

/// Like [`random_dense_operator`], but the diagonal is a random permutation of
/// `1, 2, ..., n`, which keeps the spectrum well separated.
pub fn spaced_dense_operator<R: Rng + ?Sized>(n: usize, eps: f64, rng: &mut R) -> Mat<f64> {
    let mut diagonal: Vec<f64> = (1..=n).map(|i| i as f64).collect();
    diagonal.shuffle(rng);
    perturbed_diagonal(&diagonal, eps, rng)
}
