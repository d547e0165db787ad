//! Numerical building blocks of the Davidson iteration.
//!
//! ** NOTE: We recommend using the high-level [`crate::solvers::DavidsonSolver`] instead.
//! These modules are public for callers that want to assemble their own subspace
//! iteration or benchmark individual stages.
//!
//! - [`subspace`]: the growable search-space basis, the orthogonalizer, the initial
//!   guess and the (incremental) projection `V^T A V`.
//! - [`correction`]: the DPR, Olsen and Jacobi-Davidson correction strategies.
//! - [`linear_solve`]: the dense linear solvers used by the Jacobi-Davidson correction.
//!
//! Vectors are `N x 1` [`faer::Mat`]s throughout.

use crate::error::DegeneracyReason;
use faer::{Mat, MatRef, Scale};

pub mod correction;
pub mod linear_solve;
pub mod subspace;

/// Norm below which a vector is treated as numerically zero.
pub(crate) const BREAKDOWN_TOLERANCE: f64 = 1e-14;

/// Euclidean inner product of two `N x 1` matrices.
#[inline]
pub(crate) fn dot(a: MatRef<'_, f64>, b: MatRef<'_, f64>) -> f64 {
    a.col(0).transpose() * b.col(0)
}

/// Returns `v / ||v||`, refusing vectors that are zero or not finite.
pub(crate) fn normalized(v: MatRef<'_, f64>) -> Result<Mat<f64>, DegeneracyReason> {
    let norm = v.norm_l2();
    if !norm.is_finite() {
        return Err(DegeneracyReason::NonFinite);
    }
    if norm < BREAKDOWN_TOLERANCE {
        return Err(DegeneracyReason::ZeroNorm);
    }
    Ok(v * Scale(1.0 / norm))
}
