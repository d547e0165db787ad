//! Dense linear solvers for the Jacobi-Davidson correction equation.
//!
//! The correction equation only steers the next search direction, so the iterative
//! solvers here are allowed to stop early: hitting the iteration cap or a breakdown
//! returns the best iterate found so far instead of an error. The direct solve
//! factors with Cholesky and switches to a pivoted `L B L^T` factorization when the
//! matrix turns out to be indefinite, which is the usual case for the projected
//! systems of every root above the lowest.

use super::{BREAKDOWN_TOLERANCE, dot};
use crate::error::{DavidsonError, DavidsonErrorKind};
use clap::ValueEnum;
use faer::{Mat, MatRef, Scale, Side, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Krylov dimension after which GMRES restarts.
pub const GMRES_RESTART: usize = 30;

/// Method used to solve the projected system of the Jacobi-Davidson correction.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinearSolveMethod {
    /// Conjugate gradient. Exploits symmetry; the default.
    #[default]
    Cg,
    /// Restarted GMRES with identity preconditioning.
    Gmres,
    /// Direct Cholesky (LL^T) factorization.
    #[value(alias = "llt")]
    #[serde(alias = "LLT")]
    Cholesky,
}

impl LinearSolveMethod {
    /// The canonical upper-case name of the method.
    pub fn name(self) -> &'static str {
        match self {
            LinearSolveMethod::Cg => "CG",
            LinearSolveMethod::Gmres => "GMRES",
            LinearSolveMethod::Cholesky => "CHOLESKY",
        }
    }
}

impl fmt::Display for LinearSolveMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LinearSolveMethod {
    type Err = DavidsonError;

    /// Parses a method name case-insensitively. `LLT` is accepted for Cholesky.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CG" => Ok(LinearSolveMethod::Cg),
            "GMRES" => Ok(LinearSolveMethod::Gmres),
            "CHOLESKY" | "LLT" => Ok(LinearSolveMethod::Cholesky),
            _ => Err(DavidsonErrorKind::InvalidMethod {
                kind: "linsolve",
                value: s.to_string(),
            }
            .into()),
        }
    }
}

/// Stopping criteria of the iterative solvers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearSolveOptions {
    /// Relative residual `||b - Ax|| / ||b||` at which the iteration stops.
    pub tolerance: f64,
    /// Maximum number of matrix-vector products.
    pub max_iterations: usize,
}

/// Outcome of an iterative solve.
#[derive(Clone, Debug)]
pub struct IterativeSolution {
    pub x: Mat<f64>,
    pub iterations: usize,
    /// Relative residual norm of `x`.
    pub relative_residual: f64,
}

impl IterativeSolution {
    /// Whether the relative residual reached `tolerance`.
    pub fn converged(&self, tolerance: f64) -> bool {
        self.relative_residual <= tolerance
    }
}

/// Solves `a x = b` with the requested method.
pub(crate) fn solve_linear_system(
    method: LinearSolveMethod,
    a: MatRef<'_, f64>,
    b: MatRef<'_, f64>,
    options: LinearSolveOptions,
) -> Mat<f64> {
    let solution = match method {
        LinearSolveMethod::Cg => conjugate_gradient(a, b, options),
        LinearSolveMethod::Gmres => gmres(a, b, GMRES_RESTART, options),
        LinearSolveMethod::Cholesky => return cholesky(a, b),
    };
    log::trace!(
        "{method} stopped after {} iterations, relative residual {:.2e}{}",
        solution.iterations,
        solution.relative_residual,
        if solution.converged(options.tolerance) {
            ""
        } else {
            " (not converged)"
        },
    );
    solution.x
}

/// Conjugate gradient for a symmetric `a`, starting from `x = 0`.
///
/// The iteration stops on convergence, on the iteration cap, or when the search
/// direction becomes (numerically) `a`-orthogonal to itself, which can happen when
/// `a` is singular or indefinite.
pub fn conjugate_gradient(
    a: MatRef<'_, f64>,
    b: MatRef<'_, f64>,
    options: LinearSolveOptions,
) -> IterativeSolution {
    let n = b.nrows();
    let b_norm = b.norm_l2();
    let mut x = Mat::<f64>::zeros(n, 1);
    if b_norm == 0.0 {
        return IterativeSolution {
            x,
            iterations: 0,
            relative_residual: 0.0,
        };
    }

    let mut r = b.to_owned();
    let mut p = r.clone();
    let mut rs_old = dot(r.as_ref(), r.as_ref());
    let mut iterations = 0;

    while iterations < options.max_iterations {
        if rs_old.sqrt() <= options.tolerance * b_norm {
            break;
        }
        let ap = a * p.as_ref();
        let pap = dot(p.as_ref(), ap.as_ref());
        if pap.abs() <= BREAKDOWN_TOLERANCE * dot(p.as_ref(), p.as_ref()) {
            break;
        }
        iterations += 1;

        let alpha = rs_old / pap;
        x = &x + &(&p * Scale(alpha));
        r = &r - &(&ap * Scale(alpha));

        let rs_new = dot(r.as_ref(), r.as_ref());
        p = &r + &(&p * Scale(rs_new / rs_old));
        rs_old = rs_new;
    }

    IterativeSolution {
        x,
        iterations,
        relative_residual: rs_old.sqrt() / b_norm,
    }
}

/// Restarted GMRES(`restart`) with identity preconditioning, starting from `x = 0`.
///
/// Arnoldi uses modified Gram-Schmidt; the Hessenberg least-squares problem is kept
/// in triangular form with Givens rotations, so the residual norm is available at
/// every step without forming the iterate.
pub fn gmres(
    a: MatRef<'_, f64>,
    b: MatRef<'_, f64>,
    restart: usize,
    options: LinearSolveOptions,
) -> IterativeSolution {
    let n = b.nrows();
    let b_norm = b.norm_l2();
    let mut x = Mat::<f64>::zeros(n, 1);
    if b_norm == 0.0 {
        return IterativeSolution {
            x,
            iterations: 0,
            relative_residual: 0.0,
        };
    }

    let m = restart.clamp(1, n.max(1));
    let threshold = options.tolerance * b_norm;
    let mut iterations = 0;
    let mut residual_norm = b_norm;

    while iterations < options.max_iterations {
        let r = &b.to_owned() - &(a * x.as_ref());
        let beta = r.norm_l2();
        residual_norm = beta;
        if beta <= threshold {
            break;
        }

        let mut basis = Mat::<f64>::zeros(n, m + 1);
        let mut h = Mat::<f64>::zeros(m + 1, m);
        let mut cs = vec![0.0; m];
        let mut sn = vec![0.0; m];
        let mut g = vec![0.0; m + 1];
        g[0] = beta;
        basis.col_mut(0).copy_from((&r * Scale(1.0 / beta)).col(0));

        let mut steps = 0;
        let mut invariant = false;
        for k in 0..m {
            if iterations >= options.max_iterations {
                break;
            }
            iterations += 1;

            // Arnoldi step.
            let mut w = a * basis.as_ref().get(.., k..k + 1);
            for j in 0..=k {
                let h_jk: f64 = w.col(0).transpose() * basis.col(j);
                h[(j, k)] = h_jk;
                for i in 0..n {
                    let v_ij = basis[(i, j)];
                    w[(i, 0)] -= h_jk * v_ij;
                }
            }
            let h_next = w.norm_l2();
            h[(k + 1, k)] = h_next;
            invariant = h_next <= BREAKDOWN_TOLERANCE * beta;
            if !invariant {
                basis
                    .col_mut(k + 1)
                    .copy_from((&w * Scale(1.0 / h_next)).col(0));
            }

            // Previous rotations, then a new one annihilating h[k + 1, k].
            for j in 0..k {
                let (upper, lower) = (h[(j, k)], h[(j + 1, k)]);
                h[(j, k)] = cs[j] * upper + sn[j] * lower;
                h[(j + 1, k)] = -sn[j] * upper + cs[j] * lower;
            }
            let (c, s) = givens(h[(k, k)], h[(k + 1, k)]);
            cs[k] = c;
            sn[k] = s;
            h[(k, k)] = c * h[(k, k)] + s * h[(k + 1, k)];
            h[(k + 1, k)] = 0.0;
            g[k + 1] = -s * g[k];
            g[k] *= c;

            steps = k + 1;
            residual_norm = g[k + 1].abs();
            if residual_norm <= threshold || invariant {
                break;
            }
        }

        // Back substitution on the triangular Hessenberg block, then x += V y.
        let mut y = vec![0.0; steps];
        for i in (0..steps).rev() {
            let mut sum = g[i];
            for (j, y_j) in y.iter().enumerate().skip(i + 1) {
                sum -= h[(i, j)] * y_j;
            }
            y[i] = if h[(i, i)].abs() > BREAKDOWN_TOLERANCE {
                sum / h[(i, i)]
            } else {
                0.0
            };
        }
        for (j, y_j) in y.iter().enumerate() {
            for i in 0..n {
                let v_ij = basis[(i, j)];
                x[(i, 0)] += y_j * v_ij;
            }
        }

        if residual_norm <= threshold || invariant || steps == 0 {
            break;
        }
    }

    IterativeSolution {
        x,
        iterations,
        relative_residual: residual_norm / b_norm,
    }
}

/// Givens rotation `(c, s)` with `[c s; -s c] [a; b] = [r; 0]`.
fn givens(a: f64, b: f64) -> (f64, f64) {
    if b == 0.0 {
        (1.0, 0.0)
    } else if a.abs() > b.abs() {
        let t = b / a;
        let c = 1.0 / (1.0 + t * t).sqrt();
        (c, c * t)
    } else {
        let t = a / b;
        let s = 1.0 / (1.0 + t * t).sqrt();
        (s * t, s)
    }
}

/// Solves `a x = b` through the Cholesky factorization of the symmetric `a`.
///
/// When `a` is not (numerically) positive definite, the solve falls back to the
/// Bunch-Kaufman `L B L^T` factorization, which handles symmetric indefinite
/// matrices. A singular `a` yields non-finite entries, left to the caller to detect.
pub fn cholesky(a: MatRef<'_, f64>, b: MatRef<'_, f64>) -> Mat<f64> {
    let rhs = b.to_owned();
    match a.llt(Side::Lower) {
        Ok(llt) => llt.solve(&rhs),
        Err(e) => {
            log::trace!("CHOLESKY: {e:?}, falling back to L B L^T");
            a.lblt(Side::Lower).solve(&rhs)
        }
    }
}
