//! Davidson eigensolver for the lowest eigenpairs of large symmetric operators.
//!
//! The Davidson method computes the `k` smallest eigenvalues and eigenvectors of a
//! real symmetric `N x N` operator `A` without ever factoring `A`. It maintains a
//! small orthonormal search space `V`, solves the projected eigenproblem
//! `T = V^T A V` densely, and expands `V` with corrections derived from the
//! residuals of the resulting Ritz pairs. The method works best for diagonally
//! dominant operators, where the diagonal is a good preconditioner.
//!
//! Built on the [`faer`] linear algebra framework, the solver accepts any type
//! implementing [`SymmetricOperator`]: dense [`faer::Mat`] matrices (and their views)
//! or matrix-free operators such as [`MatrixFreeOperator`], whose entries are
//! generated on demand.
//!
//! ## Correction strategies
//!
//! **DPR** ([`CorrectionMethod::Dpr`]): divides the residual elementwise by
//! `λ - A_ii`. Cheapest per iteration.
//!
//! **Olsen** ([`CorrectionMethod::Olsen`]): rescales the DPR step with the current
//! Ritz vector, removing its component along that vector.
//!
//! **Jacobi-Davidson** ([`CorrectionMethod::Jacobi`]): solves the correction equation
//! projected onto the orthogonal complement of the Ritz vector, with conjugate
//! gradients, restarted GMRES or a Cholesky factorization ([`LinearSolveMethod`]).
//! Most expensive per iteration, usually the fewest iterations.
//!
//! ## Example Usage
//!
//! ```rust
//! use davidson_project::{CorrectionMethod, DavidsonConfig, DavidsonSolver, MatrixFreeOperator};
//! use faer::Side;
//!
//! // Diagonal 1, 2, ..., 60 with off-diagonal entries 0.01 / (i - j)^2.
//! let op = MatrixFreeOperator::with_index_diagonal(60, 0.01);
//!
//! let config = DavidsonConfig::default()
//!     .with_correction(CorrectionMethod::Olsen)
//!     .with_tolerance(1e-8);
//! let result = DavidsonSolver::new(config).solve(&op, 4).unwrap();
//! assert!(result.converged);
//!
//! // Compare with a full dense diagonalization.
//! let reference = op.to_dense().self_adjoint_eigenvalues(Side::Lower).unwrap();
//! for (value, expected) in result.eigenvalues.iter().zip(&reference) {
//!     assert!((value - expected).abs() < 1e-6);
//! }
//! ```

// Declare the modules that form the crate's API structure.
pub mod algorithms;
pub mod error;
pub mod matrix;
pub mod solvers;
pub mod utils;

// Re-export the main API for convenient access.
pub use algorithms::{correction::CorrectionMethod, linear_solve::LinearSolveMethod};
pub use error::DavidsonError;
pub use matrix::{MatrixFreeOperator, SymmetricOperator};
pub use solvers::{DavidsonConfig, DavidsonResult, DavidsonSolver, davidson};
