//! Correction strategies that turn a residual into a new search direction.
//!
//! All strategies approximate the solution `t` of the correction equation
//! `(A - λI) t = -w` for a Ritz pair `(λ, q)` with residual `w = Aq - λq`:
//!
//! - **DPR** (diagonal preconditioned residual) replaces `A` by its diagonal.
//! - **Olsen** removes from the DPR step its component along the current Ritz
//!   vector, measured in the metric of the diagonal preconditioner.
//! - **Jacobi-Davidson** solves the equation restricted to the orthogonal
//!   complement of `q`, using one of the dense solvers in [`super::linear_solve`].
//!
//! The sign and scale of the returned direction are irrelevant: the caller
//! normalizes it and orthogonalizes it against the search space.

use super::{
    BREAKDOWN_TOLERANCE, dot,
    linear_solve::{LinearSolveMethod, LinearSolveOptions, cholesky, solve_linear_system},
};
use crate::{
    error::{DavidsonError, DavidsonErrorKind, DegeneracyReason},
    matrix::SymmetricOperator,
};
use clap::ValueEnum;
use faer::{Mat, MatRef, Scale};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Smallest magnitude allowed for a DPR denominator `λ - A0_i`.
pub const DPR_DENOMINATOR_FLOOR: f64 = 1e-8;

/// How residuals are turned into new search directions.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CorrectionMethod {
    /// Diagonal preconditioned residual (classic Davidson).
    #[default]
    Dpr,
    /// Jacobi-Davidson projected correction equation.
    Jacobi,
    /// Olsen's rescaled DPR correction.
    Olsen,
}

impl CorrectionMethod {
    /// The canonical upper-case name of the method.
    pub fn name(self) -> &'static str {
        match self {
            CorrectionMethod::Dpr => "DPR",
            CorrectionMethod::Jacobi => "JACOBI",
            CorrectionMethod::Olsen => "OLSEN",
        }
    }
}

impl fmt::Display for CorrectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CorrectionMethod {
    type Err = DavidsonError;

    /// Parses a method name case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DPR" => Ok(CorrectionMethod::Dpr),
            "JACOBI" => Ok(CorrectionMethod::Jacobi),
            "OLSEN" => Ok(CorrectionMethod::Olsen),
            _ => Err(DavidsonErrorKind::InvalidMethod {
                kind: "correction",
                value: s.to_string(),
            }
            .into()),
        }
    }
}

/// DPR correction: `t_i = w_i / (λ - A0_i)`.
///
/// Denominators smaller in magnitude than [`DPR_DENOMINATOR_FLOOR`] are replaced by
/// the floor, keeping their sign (zero counts as positive).
pub fn dpr_correction(w: MatRef<'_, f64>, diagonal: &[f64], lambda: f64) -> Mat<f64> {
    Mat::from_fn(w.nrows(), 1, |i, _| {
        let denominator = lambda - diagonal[i];
        let guarded = if denominator.abs() < DPR_DENOMINATOR_FLOOR {
            DPR_DENOMINATOR_FLOOR.copysign(denominator)
        } else {
            denominator
        };
        w[(i, 0)] / guarded
    })
}

/// Olsen correction: `t = d - ε s` with `d = M^-1 w`, `s = M^-1 q`, `M = λ - diag(A)`
/// and `ε = (q^T d) / (q^T s)`, so that `q^T t = 0`.
///
/// When `q^T d` already vanishes, as it does for Ritz vectors of a basis made of unit
/// vectors, the step reduces to the DPR correction.
pub(crate) fn olsen_correction(
    w: MatRef<'_, f64>,
    q: MatRef<'_, f64>,
    diagonal: &[f64],
    lambda: f64,
) -> Result<Mat<f64>, DegeneracyReason> {
    let d = dpr_correction(w, diagonal, lambda);
    let s = dpr_correction(q, diagonal, lambda);
    let denominator = dot(q, s.as_ref());
    if !denominator.is_finite() {
        return Err(DegeneracyReason::NonFinite);
    }
    if denominator.abs() < BREAKDOWN_TOLERANCE * s.norm_l2() {
        return Err(DegeneracyReason::OlsenDenominator);
    }
    let epsilon = dot(q, d.as_ref()) / denominator;
    Ok(&d - &(&s * Scale(epsilon)))
}

/// Builds the projected shifted operator `P (A - λI) P^T` with `P = I - q q^T`.
///
/// This is a dense `N x N` matrix: every column of `P^T` is applied to the operator.
pub fn projected_shifted_operator<O>(operator: &O, q: MatRef<'_, f64>, lambda: f64) -> Mat<f64>
where
    O: SymmetricOperator + ?Sized,
{
    let n = q.nrows();
    let projector = &Mat::<f64>::identity(n, n) - &(q * q.transpose());
    let a_pt = operator.apply(projector.transpose());
    let shifted = &a_pt - &(projector.transpose() * Scale(lambda));
    projector.as_ref() * shifted.as_ref()
}

/// Jacobi-Davidson correction: solves `P (A - λI) P^T t = w`.
///
/// The iterative solvers work on the singular projected matrix directly; since `w`
/// is orthogonal to `q`, the system is consistent. The direct solve needs a
/// nonsingular matrix, so it factors `P (A - λI) P^T + q q^T`, which has the same
/// solution for a right-hand side orthogonal to `q`. For roots above the lowest this
/// matrix is indefinite and [`cholesky`] switches to a pivoted `L B L^T` solve.
pub(crate) fn jacobi_correction<O>(
    operator: &O,
    w: MatRef<'_, f64>,
    q: MatRef<'_, f64>,
    lambda: f64,
    method: LinearSolveMethod,
    options: LinearSolveOptions,
) -> Result<Mat<f64>, DegeneracyReason>
where
    O: SymmetricOperator + ?Sized,
{
    let projected = projected_shifted_operator(operator, q, lambda);
    let t = match method {
        LinearSolveMethod::Cholesky => {
            let deflated = &projected + &(q * q.transpose());
            cholesky(deflated.as_ref(), w)
        }
        _ => solve_linear_system(method, projected.as_ref(), w, options),
    };

    if (0..t.nrows()).any(|i| !t[(i, 0)].is_finite()) {
        return Err(DegeneracyReason::NonFinite);
    }
    Ok(t)
}

/// Inputs shared by all corrections of one Davidson iteration.
pub(crate) struct CorrectionContext<'a, O: ?Sized> {
    pub operator: &'a O,
    pub diagonal: &'a [f64],
    pub method: CorrectionMethod,
    pub linear_solver: LinearSolveMethod,
    pub linear_solve_options: LinearSolveOptions,
}

impl<O> CorrectionContext<'_, O>
where
    O: SymmetricOperator + ?Sized,
{
    /// Computes the (unnormalized) correction for the Ritz pair `(lambda, q)`
    /// with residual `w`.
    pub fn correct(
        &self,
        w: MatRef<'_, f64>,
        q: MatRef<'_, f64>,
        lambda: f64,
    ) -> Result<Mat<f64>, DegeneracyReason> {
        match self.method {
            CorrectionMethod::Dpr => Ok(dpr_correction(w, self.diagonal, lambda)),
            CorrectionMethod::Olsen => olsen_correction(w, q, self.diagonal, lambda),
            CorrectionMethod::Jacobi => jacobi_correction(
                self.operator,
                w,
                q,
                lambda,
                self.linear_solver,
                self.linear_solve_options,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{
        normalized,
        subspace::{initial_guess, project},
    };
    use faer::{Side, mat};

    const OPTIONS: LinearSolveOptions = LinearSolveOptions {
        tolerance: 1e-12,
        max_iterations: 200,
    };

    /// A small symmetric operator with a unit Ritz vector `q`, its Ritz value and residual.
    fn ritz_problem() -> (Mat<f64>, Mat<f64>, f64, Mat<f64>) {
        let a = mat![
            [1.0, 0.1, 0.0, 0.05],
            [0.1, 3.0, 0.2, 0.0],
            [0.0, 0.2, 5.0, 0.1],
            [0.05, 0.0, 0.1, 7.0],
        ];
        let q = normalized(mat![[1.0], [0.3], [0.1], [0.0]].as_ref()).unwrap();
        let aq = &a * &q;
        let lambda = dot(q.as_ref(), aq.as_ref());
        let w = &aq - &(&q * Scale(lambda));
        (a, q, lambda, w)
    }

    #[test]
    fn test_method_names() {
        assert_eq!(
            "jacobi".parse::<CorrectionMethod>().unwrap(),
            CorrectionMethod::Jacobi
        );
        assert_eq!(" Olsen ".parse::<CorrectionMethod>().unwrap(), CorrectionMethod::Olsen);
        assert_eq!(CorrectionMethod::default(), CorrectionMethod::Dpr);
        assert_eq!(CorrectionMethod::Dpr.to_string(), "DPR");
        let err = "NEWTON".parse::<CorrectionMethod>().unwrap_err();
        assert_eq!(err.to_string(), "Not a valid correction method: 'NEWTON'");
    }

    #[test]
    fn test_dpr_correction() {
        let w = mat![[1.0], [2.0], [3.0]];
        let t = dpr_correction(w.as_ref(), &[0.0, 1.0, 4.0], 2.0);
        assert_eq!(t, mat![[0.5], [2.0], [-1.5]]);
    }

    #[test]
    fn test_dpr_correction_guards_small_denominators() {
        let w = mat![[1e-9], [1e-9]];
        let t = dpr_correction(w.as_ref(), &[2.0, 2.0 + 1e-12], 2.0);
        assert!((t[(0, 0)] - 1e-1).abs() < 1e-15);
        assert!((t[(1, 0)] + 1e-1).abs() < 1e-15);
        assert!(t.norm_l2().is_finite());
    }

    #[test]
    fn test_olsen_correction() {
        let (a, q, lambda, w) = ritz_problem();
        let diagonal = SymmetricOperator::diagonal(&a);
        let t = olsen_correction(w.as_ref(), q.as_ref(), &diagonal, lambda).unwrap();

        assert!(dot(q.as_ref(), t.as_ref()).abs() < 1e-12);
        let d = dpr_correction(w.as_ref(), &diagonal, lambda);
        let s = dpr_correction(q.as_ref(), &diagonal, lambda);
        let epsilon = dot(q.as_ref(), d.as_ref()) / dot(q.as_ref(), s.as_ref());
        let expected = &d - &(&s * Scale(epsilon));
        assert!((&t - &expected).norm_l2() < 1e-12);
    }

    #[test]
    fn test_olsen_correction_on_unit_vector_basis() {
        // The residual of a Ritz pair from a basis of unit vectors vanishes on the
        // rows of those vectors, so q^T d = 0 and the step is plain DPR.
        let a = Mat::from_fn(6, 6, |i, j| {
            if i == j {
                (i + 1) as f64
            } else {
                0.3 / ((i as f64 - j as f64).powi(2))
            }
        });
        let diagonal = SymmetricOperator::diagonal(&a);
        let v = initial_guess(&diagonal, 2);
        let evd = project(&a, v.as_ref()).self_adjoint_eigen(Side::Lower).unwrap();

        for j in 0..2 {
            let q = v.as_ref() * evd.U().get(.., j..j + 1);
            let lambda = evd.S()[j];
            let w = &(&a * &q) - &(&q * Scale(lambda));

            let d = dpr_correction(w.as_ref(), &diagonal, lambda);
            assert!(dot(q.as_ref(), d.as_ref()).abs() < 1e-12);

            let t = olsen_correction(w.as_ref(), q.as_ref(), &diagonal, lambda).unwrap();
            assert!(t.norm_l2() > 0.0);
            assert!((&t - &d).norm_l2() < 1e-10 * d.norm_l2());
        }
    }

    #[test]
    fn test_olsen_correction_rejects_vanishing_denominator() {
        // q^T (λ - D)^-1 q = 0.5 / 1 + 0.5 / (-1) = 0.
        let q = normalized(mat![[1.0], [1.0]].as_ref()).unwrap();
        let w = mat![[1.0], [-1.0]];
        let err = olsen_correction(w.as_ref(), q.as_ref(), &[0.0, 2.0], 1.0).unwrap_err();
        assert_eq!(err, DegeneracyReason::OlsenDenominator);
    }

    #[test]
    fn test_projected_operator_annihilates_q() {
        let (a, q, lambda, _) = ritz_problem();
        let projected = projected_shifted_operator(&a, q.as_ref(), lambda);
        assert!((&projected * &q).norm_l2() < 1e-12);
        assert!((q.transpose() * projected.as_ref()).norm_l2() < 1e-12);
        assert!((projected.as_ref() - projected.transpose()).norm_l2() < 1e-12);
    }

    macro_rules! jacobi_solves_correction_equation {
        ($test_name:ident, $method:expr) => {
            #[test]
            fn $test_name() {
                let (a, q, lambda, w) = ritz_problem();
                let t = jacobi_correction(&a, w.as_ref(), q.as_ref(), lambda, $method, OPTIONS)
                    .unwrap();

                // The solution satisfies the projected equation and is orthogonal to q.
                let projected = projected_shifted_operator(&a, q.as_ref(), lambda);
                assert!((&(&projected * &t) - &w).norm_l2() < 1e-8);
                assert!(dot(q.as_ref(), t.as_ref()).abs() < 1e-8);
            }
        };
    }

    jacobi_solves_correction_equation!(test_jacobi_cg, LinearSolveMethod::Cg);
    jacobi_solves_correction_equation!(test_jacobi_gmres, LinearSolveMethod::Gmres);
    jacobi_solves_correction_equation!(test_jacobi_cholesky, LinearSolveMethod::Cholesky);

    #[test]
    fn test_jacobi_cholesky_solves_indefinite_system() {
        // Targeting the second Ritz pair leaves a negative direction (e_0) in the
        // projected shifted operator.
        let (a, _, _, _) = ritz_problem();
        let q = mat![[0.0], [1.0], [0.0], [0.0]];
        let lambda = a[(1, 1)];
        let w = &(&a * &q) - &(&q * Scale(lambda));
        let projected = projected_shifted_operator(&a, q.as_ref(), lambda);
        let deflated = &projected + &(q.as_ref() * q.transpose());
        assert!(deflated.llt(Side::Lower).is_err());

        let t = jacobi_correction(
            &a,
            w.as_ref(),
            q.as_ref(),
            lambda,
            LinearSolveMethod::Cholesky,
            OPTIONS,
        )
        .unwrap();
        assert!((&(&projected * &t) - &w).norm_l2() < 1e-10);
        assert!(dot(q.as_ref(), t.as_ref()).abs() < 1e-10);
    }

    #[test]
    fn test_context_dispatch() {
        let (a, q, lambda, w) = ritz_problem();
        let diagonal = SymmetricOperator::diagonal(&a);
        let context = CorrectionContext {
            operator: &a,
            diagonal: &diagonal,
            method: CorrectionMethod::Dpr,
            linear_solver: LinearSolveMethod::Cg,
            linear_solve_options: OPTIONS,
        };
        let t = context.correct(w.as_ref(), q.as_ref(), lambda).unwrap();
        assert_eq!(t, dpr_correction(w.as_ref(), &diagonal, lambda));
    }
}
