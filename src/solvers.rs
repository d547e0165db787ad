//! This module provides the high-level API for computing the lowest eigenpairs of a
//! symmetric operator with the Davidson method.
//!
//! A [`DavidsonConfig`] selects the correction strategy, the linear solver used by
//! the Jacobi-Davidson correction and the stopping criteria. A [`DavidsonSolver`]
//! holds a configuration and can be reused across operators: every call to
//! [`DavidsonSolver::solve`] owns its own search space and returns an immutable
//! [`DavidsonResult`].

use crate::{
    algorithms::{
        correction::{CorrectionContext, CorrectionMethod},
        linear_solve::{LinearSolveMethod, LinearSolveOptions},
        normalized,
        subspace::{SearchSpace, initial_guess, project, update_projected_matrix},
    },
    error::{DavidsonError, DavidsonErrorKind},
    matrix::SymmetricOperator,
};
use faer::{Mat, MatRef, Side};
use serde::{Deserialize, Serialize};

/// Parameters of a Davidson solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DavidsonConfig {
    /// How residuals are turned into new search directions.
    pub correction: CorrectionMethod,
    /// Linear solver for the Jacobi-Davidson correction equation.
    pub linear_solver: LinearSolveMethod,
    /// Convergence threshold on the mean residual norm of the requested roots.
    pub tolerance: f64,
    /// Maximum number of outer iterations.
    pub max_iterations: usize,
    /// Subspace dimension above which the basis collapses to the current Ritz vectors.
    pub max_search_space: usize,
    /// Number of initial unit vectors; `0` means twice the number of requested roots.
    pub initial_guess_size: usize,
    /// Relative residual target of the inner linear solve (defaults to `tolerance`).
    pub linear_solve_tolerance: Option<f64>,
    /// Iteration cap of the inner linear solve (defaults to `max_iterations`).
    pub linear_solve_max_iterations: Option<usize>,
}

impl Default for DavidsonConfig {
    fn default() -> Self {
        Self {
            correction: CorrectionMethod::Dpr,
            linear_solver: LinearSolveMethod::Cg,
            tolerance: 1e-6,
            max_iterations: 1000,
            max_search_space: 100,
            initial_guess_size: 0,
            linear_solve_tolerance: None,
            linear_solve_max_iterations: None,
        }
    }
}

impl DavidsonConfig {
    /// Builds a configuration from method names, as a command line or a config file
    /// would supply them.
    ///
    /// Method names are matched case-insensitively (`LLT` is accepted for
    /// `CHOLESKY`). An unknown name fails here, before any solve starts.
    ///
    /// # Example
    /// ```
    /// use davidson_project::{CorrectionMethod, DavidsonConfig};
    ///
    /// let config = DavidsonConfig::configure("jacobi", "gmres", 1e-8, 200, 40, 0).unwrap();
    /// assert_eq!(config.correction, CorrectionMethod::Jacobi);
    /// assert!(DavidsonConfig::configure("newton", "cg", 1e-8, 200, 40, 0).is_err());
    /// ```
    pub fn configure(
        correction: &str,
        linear_solver: &str,
        tolerance: f64,
        max_iterations: usize,
        max_search_space: usize,
        initial_guess_size: usize,
    ) -> Result<Self, DavidsonError> {
        Ok(Self {
            correction: correction.parse()?,
            linear_solver: linear_solver.parse()?,
            tolerance,
            max_iterations,
            max_search_space,
            initial_guess_size,
            ..Self::default()
        })
    }

    pub fn with_correction(mut self, correction: CorrectionMethod) -> Self {
        self.correction = correction;
        self
    }

    pub fn with_linear_solver(mut self, linear_solver: LinearSolveMethod) -> Self {
        self.linear_solver = linear_solver;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_search_space(mut self, max_search_space: usize) -> Self {
        self.max_search_space = max_search_space;
        self
    }

    pub fn with_initial_guess_size(mut self, initial_guess_size: usize) -> Self {
        self.initial_guess_size = initial_guess_size;
        self
    }

    pub fn with_linear_solve_tolerance(mut self, tolerance: f64) -> Self {
        self.linear_solve_tolerance = Some(tolerance);
        self
    }

    pub fn with_linear_solve_max_iterations(mut self, max_iterations: usize) -> Self {
        self.linear_solve_max_iterations = Some(max_iterations);
        self
    }

    /// Options handed to the inner linear solver.
    pub fn linear_solve_options(&self) -> LinearSolveOptions {
        LinearSolveOptions {
            tolerance: self.linear_solve_tolerance.unwrap_or(self.tolerance),
            max_iterations: self
                .linear_solve_max_iterations
                .unwrap_or(self.max_iterations),
        }
    }

    /// Initial subspace dimension for `k` roots of an operator of size `n`.
    fn effective_guess_size(&self, n: usize, k: usize) -> usize {
        let requested = if self.initial_guess_size == 0 {
            2 * k
        } else {
            self.initial_guess_size
        };
        requested.max(k).min(n)
    }

    fn validate(&self, n: usize, k: usize) -> Result<(), DavidsonError> {
        if k == 0 {
            return Err(DavidsonError::input("at least one eigenpair must be requested"));
        }
        if k > n {
            return Err(DavidsonError::input(format!(
                "requested {k} eigenpairs from an operator of size {n}"
            )));
        }
        if self.max_search_space < 2 * k {
            return Err(DavidsonError::input(format!(
                "max_search_space ({}) must be at least twice the number of eigenpairs ({k})",
                self.max_search_space
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(DavidsonError::input(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// The outcome of a Davidson solve.
///
/// When `converged` is `false`, `eigenvalues` and `eigenvectors` are zero-filled;
/// the diagnostics still describe the last iteration.
#[derive(Debug, Clone)]
pub struct DavidsonResult {
    /// The `k` lowest eigenvalues, ascending.
    pub eigenvalues: Vec<f64>,
    /// The matching eigenvectors as the columns of an `N x k` matrix.
    pub eigenvectors: Mat<f64>,
    pub converged: bool,
    /// Number of outer iterations performed.
    pub iterations: usize,
    /// Mean residual norm `||A q_j - λ_j q_j||` over the requested roots.
    pub residual_norm: f64,
    /// Norm of the change of the `k` Ritz values during the last iteration.
    pub eigenvalue_change: f64,
}

/// Davidson eigensolver for the lowest eigenpairs of a symmetric operator.
#[derive(Debug, Clone, Default)]
pub struct DavidsonSolver {
    config: DavidsonConfig,
}

impl DavidsonSolver {
    pub fn new(config: DavidsonConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DavidsonConfig {
        &self.config
    }

    /// Computes the `k` lowest eigenpairs of `operator`.
    ///
    /// # Arguments
    /// * `operator`: a symmetric operator, dense or matrix-free. Only its diagonal
    ///   and its products with blocks of vectors are used.
    /// * `k`: the number of eigenpairs, `1 <= k <= N`.
    ///
    /// # Returns
    /// A [`DavidsonResult`]. Running out of iterations is reported through
    /// `converged == false`, not as an error.
    ///
    /// # Errors
    /// * `InputError` when `k` is out of range, the maximum search space is smaller
    ///   than `2k`, or the tolerance is not positive.
    /// * `NumericalDegeneracy` when a correction vector cannot be formed.
    /// * `EvdError` when the projected eigenproblem cannot be solved.
    pub fn solve<O>(&self, operator: &O, k: usize) -> Result<DavidsonResult, DavidsonError>
    where
        O: SymmetricOperator + ?Sized,
    {
        let config = &self.config;
        let n = operator.size();
        config.validate(n, k)?;

        log::info!(
            "Davidson: {k} eigenpairs of a {n} x {n} operator, correction {}{}",
            config.correction,
            if config.correction == CorrectionMethod::Jacobi {
                format!(" ({})", config.linear_solver)
            } else {
                String::new()
            },
        );

        let diagonal = operator.diagonal();
        let mut space = SearchSpace::new(initial_guess(
            &diagonal,
            config.effective_guess_size(n, k),
        ));
        let mut projected = project(operator, space.basis());

        let context = CorrectionContext {
            operator,
            diagonal: &diagonal,
            method: config.correction,
            linear_solver: config.linear_solver,
            linear_solve_options: config.linear_solve_options(),
        };

        let mut previous = vec![0.0; k];
        let mut residual_norm = f64::INFINITY;
        let mut eigenvalue_change = f64::INFINITY;

        for iteration in 1..=config.max_iterations {
            let evd = projected
                .self_adjoint_eigen(Side::Lower)
                .map_err(|e| DavidsonError::from(DavidsonErrorKind::EvdError(e)))?;
            let eigenvalues: Vec<f64> = (0..k).map(|j| evd.S()[j]).collect();
            let ritz = space.basis() * evd.U().get(.., 0..k);

            let product = operator.apply(ritz.as_ref());
            let residuals = Mat::from_fn(n, k, |i, j| {
                product[(i, j)] - eigenvalues[j] * ritz[(i, j)]
            });
            let norms: Vec<f64> = (0..k).map(|j| residuals.col(j).norm_l2()).collect();

            residual_norm = norms.iter().sum::<f64>() / k as f64;
            eigenvalue_change = eigenvalues
                .iter()
                .zip(&previous)
                .map(|(new, old)| (new - old).powi(2))
                .sum::<f64>()
                .sqrt();
            previous.copy_from_slice(&eigenvalues);

            log::debug!(
                "iteration {iteration:4}: subspace {:4}, residual {residual_norm:.3e}, eigenvalue change {eigenvalue_change:.3e}",
                space.ncols(),
            );

            if residual_norm < config.tolerance {
                log::info!(
                    "Converged after {iteration} iterations: residual norm {residual_norm:.3e}, eigenvalue change {eigenvalue_change:.3e}"
                );
                return Ok(DavidsonResult {
                    eigenvalues,
                    eigenvectors: ritz,
                    converged: true,
                    iterations: iteration,
                    residual_norm,
                    eigenvalue_change,
                });
            }

            // Roots that already meet the tolerance do not expand the subspace.
            let open: Vec<usize> = (0..k).filter(|&j| norms[j] >= config.tolerance).collect();
            space.reserve(open.len());
            for &j in &open {
                let degenerate = |reason| DavidsonError::degeneracy(iteration, j, reason);
                let correction = context
                    .correct(
                        residuals.as_ref().get(.., j..j + 1),
                        ritz.as_ref().get(.., j..j + 1),
                        eigenvalues[j],
                    )
                    .map_err(degenerate)?;
                let direction = normalized(correction.as_ref()).map_err(degenerate)?;
                space.push_column(direction.as_ref());
            }

            // Growth past N needs no restart: the thin QR below caps the basis at N
            // columns, which then span the whole space.
            if space.ncols() > config.max_search_space {
                log::debug!(
                    "iteration {iteration:4}: restart, collapsing {} columns to {k} Ritz vectors",
                    space.ncols()
                );
                space = SearchSpace::new(normalized_columns(ritz.as_ref()));
                projected = project(operator, space.basis());
            } else {
                space.orthonormalize();
                projected = update_projected_matrix(&projected, operator, space.basis());
            }
        }

        log::warn!(
            "Davidson did not converge within {} iterations: residual norm {residual_norm:.3e}, eigenvalue change {eigenvalue_change:.3e}",
            config.max_iterations
        );
        Ok(DavidsonResult {
            eigenvalues: vec![0.0; k],
            eigenvectors: Mat::zeros(n, k),
            converged: false,
            iterations: config.max_iterations,
            residual_norm,
            eigenvalue_change,
        })
    }
}

/// Computes the `k` lowest eigenpairs of `operator` with the given configuration.
///
/// Shorthand for `DavidsonSolver::new(*config).solve(operator, k)`.
pub fn davidson<O>(
    operator: &O,
    k: usize,
    config: &DavidsonConfig,
) -> Result<DavidsonResult, DavidsonError>
where
    O: SymmetricOperator + ?Sized,
{
    DavidsonSolver::new(*config).solve(operator, k)
}

fn normalized_columns(v: MatRef<'_, f64>) -> Mat<f64> {
    let norms: Vec<f64> = (0..v.ncols()).map(|j| v.col(j).norm_l2()).collect();
    Mat::from_fn(v.nrows(), v.ncols(), |i, j| v[(i, j)] / norms[j])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixFreeOperator;

    fn diagonal_matrix(values: &[f64]) -> Mat<f64> {
        Mat::from_fn(values.len(), values.len(), |i, j| {
            if i == j { values[i] } else { 0.0 }
        })
    }

    #[test]
    fn test_default_config() {
        let config = DavidsonConfig::default();
        assert_eq!(config.correction, CorrectionMethod::Dpr);
        assert_eq!(config.linear_solver, LinearSolveMethod::Cg);
        assert_eq!(config.tolerance, 1e-6);
        assert_eq!(config.max_iterations, 1000);
        assert_eq!(config.max_search_space, 100);
        assert_eq!(config.initial_guess_size, 0);

        let options = config.linear_solve_options();
        assert_eq!(options.tolerance, 1e-6);
        assert_eq!(options.max_iterations, 1000);
    }

    #[test]
    fn test_configure_parses_method_names() {
        let config = DavidsonConfig::configure("Olsen", "llt", 1e-9, 50, 20, 6).unwrap();
        assert_eq!(config.correction, CorrectionMethod::Olsen);
        assert_eq!(config.linear_solver, LinearSolveMethod::Cholesky);
        assert_eq!(config.initial_guess_size, 6);

        let err = DavidsonConfig::configure("DPR", "BICGSTAB", 1e-9, 50, 20, 0).unwrap_err();
        assert_eq!(err.to_string(), "Not a valid linsolve method: 'BICGSTAB'");
    }

    #[test]
    fn test_builder_and_inner_solve_overrides() {
        let config = DavidsonConfig::default()
            .with_correction(CorrectionMethod::Jacobi)
            .with_linear_solver(LinearSolveMethod::Gmres)
            .with_linear_solve_tolerance(1e-3)
            .with_linear_solve_max_iterations(15);
        let options = config.linear_solve_options();
        assert_eq!(options.tolerance, 1e-3);
        assert_eq!(options.max_iterations, 15);
    }

    #[test]
    fn test_effective_guess_size() {
        let config = DavidsonConfig::default();
        assert_eq!(config.effective_guess_size(100, 5), 10);
        assert_eq!(config.effective_guess_size(7, 5), 7);
        assert_eq!(config.with_initial_guess_size(2).effective_guess_size(100, 5), 5);
    }

    #[test]
    fn test_validation_errors() {
        let a = diagonal_matrix(&[1.0, 2.0, 3.0, 4.0]);
        let solver = DavidsonSolver::default();
        assert!(solver.solve(&a, 0).unwrap_err().is_input_error());
        assert!(solver.solve(&a, 5).unwrap_err().is_input_error());

        let small_space = DavidsonSolver::new(DavidsonConfig::default().with_max_search_space(3));
        assert!(small_space.solve(&a, 2).unwrap_err().is_input_error());

        let bad_tolerance = DavidsonSolver::new(DavidsonConfig::default().with_tolerance(0.0));
        assert!(bad_tolerance.solve(&a, 1).unwrap_err().is_input_error());
    }

    #[test]
    fn test_diagonal_operator_converges_immediately() {
        let a = diagonal_matrix(&[5.0, -1.0, 3.0, 0.5, 2.0, 8.0]);
        let result = DavidsonSolver::default().solve(&a, 3).unwrap();
        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        for (value, expected) in result.eigenvalues.iter().zip([-1.0, 0.5, 2.0]) {
            assert!((value - expected).abs() < 1e-12);
        }
        assert!(result.residual_norm < 1e-12);
    }

    #[test]
    fn test_full_space_is_exact() {
        // k = N: the initial guess already spans the whole space.
        let a = MatrixFreeOperator::with_index_diagonal(4, 0.3).to_dense();
        let result = DavidsonSolver::new(DavidsonConfig::default().with_max_search_space(8))
            .solve(&a, 4)
            .unwrap();
        assert!(result.converged);

        let reference = a.self_adjoint_eigenvalues(Side::Lower).unwrap();
        for (value, expected) in result.eigenvalues.iter().zip(&reference) {
            assert!((value - expected).abs() < 1e-10);
        }
    }

    #[test]
    fn test_small_operator_converges_through_capped_basis() {
        // The subspace outgrows N = 6 long before max_search_space, so the
        // orthogonalizer caps it at the full space.
        let op = MatrixFreeOperator::with_index_diagonal(6, 0.5);
        let result = DavidsonSolver::default().solve(&op, 2).unwrap();
        assert!(result.converged);

        let reference = op.to_dense().self_adjoint_eigenvalues(Side::Lower).unwrap();
        assert!((result.eigenvalues[0] - reference[0]).abs() < 1e-8);
        assert!((result.eigenvalues[1] - reference[1]).abs() < 1e-8);
    }

    #[test]
    fn test_non_convergence_returns_zeroed_outputs() {
        let op = MatrixFreeOperator::with_index_diagonal(40, 0.5);
        let config = DavidsonConfig::default().with_max_iterations(1);
        let result = davidson(&op, 3, &config).unwrap();

        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.eigenvalues, vec![0.0; 3]);
        assert_eq!(result.eigenvectors, Mat::<f64>::zeros(40, 3));
        assert!(result.residual_norm > config.tolerance);
    }

    #[test]
    fn test_eigenvectors_satisfy_eigen_equation() {
        let op = MatrixFreeOperator::with_index_diagonal(30, 0.2);
        let result = DavidsonSolver::new(DavidsonConfig::default().with_tolerance(1e-9))
            .solve(&op, 3)
            .unwrap();
        assert!(result.converged);

        let av = SymmetricOperator::apply(&op, result.eigenvectors.as_ref());
        for j in 0..3 {
            let residual = Mat::from_fn(30, 1, |i, _| {
                av[(i, j)] - result.eigenvalues[j] * result.eigenvectors[(i, j)]
            });
            assert!(residual.norm_l2() < 1e-8);
            assert!((result.eigenvectors.col(j).norm_l2() - 1.0).abs() < 1e-10);
        }
        assert!(result.eigenvalues.windows(2).all(|w| w[0] <= w[1]));
    }
}
