//! This module defines the core abstraction for symmetric linear operators.
//!
//! The Davidson method never needs random access to the entries of the matrix
//! whose eigenpairs it computes. It only needs three things:
//! 1.  the dimension `N` of the operator,
//! 2.  its diagonal, which drives the initial guess and the diagonal preconditioners,
//! 3.  the product of the operator with a block of column vectors.
//!
//! Capturing these in the [`SymmetricOperator`] trait lets the solver run unchanged
//! on explicitly stored dense matrices and on "matrix-free" operators such as
//! [`MatrixFreeOperator`], whose entries are generated analytically on demand.
//!
//! Symmetry of the represented matrix is a precondition of the trait and is not
//! checked at runtime.

use crate::utils::generators::random_diagonal_entry;
use faer::{Mat, MatMut, MatRef, prelude::Reborrow};
use rand::Rng;

/// A real symmetric `N x N` linear map, known only through its action.
///
/// # Example
///
/// ```
/// use davidson_project::SymmetricOperator;
/// use faer::mat;
///
/// let a = mat![[2.0, -1.0], [-1.0, 2.0]];
/// let x = mat![[1.0], [1.0]];
///
/// // `Mat` has an inherent `diagonal()` view, so the trait method is named explicitly.
/// assert_eq!(SymmetricOperator::size(&a), 2);
/// assert_eq!(SymmetricOperator::diagonal(&a), vec![2.0, 2.0]);
/// assert_eq!(SymmetricOperator::apply(&a, x.as_ref()), mat![[1.0], [1.0]]);
/// ```
pub trait SymmetricOperator {
    /// Returns the dimension `N` of the operator.
    fn size(&self) -> usize;

    /// Returns the `N` diagonal entries of the operator.
    fn diagonal(&self) -> Vec<f64>;

    /// Applies the operator to the `N x c` block `rhs` and returns `A * rhs`.
    ///
    /// A single vector is passed as an `N x 1` matrix.
    ///
    /// # Panics
    ///
    /// Implementations panic if `rhs` does not have `N` rows.
    fn apply(&self, rhs: MatRef<'_, f64>) -> Mat<f64>;
}

impl<'a> SymmetricOperator for MatRef<'a, f64> {
    #[inline]
    fn size(&self) -> usize {
        self.nrows()
    }

    fn diagonal(&self) -> Vec<f64> {
        (0..self.nrows().min(self.ncols()))
            .map(|i| self[(i, i)])
            .collect()
    }

    #[inline]
    fn apply(&self, rhs: MatRef<'_, f64>) -> Mat<f64> {
        assert_eq!(
            self.ncols(),
            rhs.nrows(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            self.ncols(),
            rhs.nrows(),
        );
        *self * rhs
    }
}

impl<'a> SymmetricOperator for MatMut<'a, f64> {
    #[inline]
    fn size(&self) -> usize {
        SymmetricOperator::size(&self.rb())
    }

    #[inline]
    fn diagonal(&self) -> Vec<f64> {
        SymmetricOperator::diagonal(&self.rb())
    }

    #[inline]
    fn apply(&self, rhs: MatRef<'_, f64>) -> Mat<f64> {
        SymmetricOperator::apply(&self.rb(), rhs)
    }
}

impl SymmetricOperator for Mat<f64> {
    #[inline]
    fn size(&self) -> usize {
        SymmetricOperator::size(&self.as_ref())
    }

    #[inline]
    fn diagonal(&self) -> Vec<f64> {
        SymmetricOperator::diagonal(&self.as_ref())
    }

    #[inline]
    fn apply(&self, rhs: MatRef<'_, f64>) -> Mat<f64> {
        SymmetricOperator::apply(&self.as_ref(), rhs)
    }
}

/// A dense symmetric operator that is never stored.
///
/// Entry `(r, c)` is `diagonal[c]` when `r == c` and `sparsity / (r - c)^2`
/// otherwise, so the off-diagonal coupling decays quadratically away from the
/// diagonal. Columns are generated on demand inside [`SymmetricOperator::apply`],
/// which keeps memory at `O(N)` for the operator itself.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixFreeOperator {
    diagonal: Vec<f64>,
    sparsity: f64,
}

impl MatrixFreeOperator {
    /// Creates an operator from explicit diagonal entries and an off-diagonal strength.
    pub fn new(diagonal: Vec<f64>, sparsity: f64) -> Self {
        Self { diagonal, sparsity }
    }

    /// Creates an operator of size `n` whose diagonal is `1, 2, ..., n`.
    pub fn with_index_diagonal(n: usize, sparsity: f64) -> Self {
        Self::new((1..=n).map(|i| i as f64).collect(), sparsity)
    }

    /// Creates an operator of size `n` with diagonal entries drawn from
    /// `{1.0, 1.1, ..., 100.9}`.
    pub fn random<R: Rng + ?Sized>(n: usize, sparsity: f64, rng: &mut R) -> Self {
        let diagonal = (0..n).map(|_| random_diagonal_entry(rng)).collect();
        Self::new(diagonal, sparsity)
    }

    /// Returns the off-diagonal strength.
    pub fn sparsity(&self) -> f64 {
        self.sparsity
    }

    /// Returns entry `(row, col)` of the represented matrix.
    #[inline]
    pub fn entry(&self, row: usize, col: usize) -> f64 {
        if row == col {
            self.diagonal[col]
        } else {
            let offset = row as f64 - col as f64;
            self.sparsity / (offset * offset)
        }
    }

    /// Generates column `col` as an `N x 1` matrix.
    pub fn column(&self, col: usize) -> Mat<f64> {
        Mat::from_fn(self.diagonal.len(), 1, |row, _| self.entry(row, col))
    }

    /// Materializes the full matrix. Intended for verification against a direct
    /// eigensolver only; this allocates `N^2` entries.
    pub fn to_dense(&self) -> Mat<f64> {
        let n = self.diagonal.len();
        Mat::from_fn(n, n, |row, col| self.entry(row, col))
    }
}

impl SymmetricOperator for MatrixFreeOperator {
    #[inline]
    fn size(&self) -> usize {
        self.diagonal.len()
    }

    fn diagonal(&self) -> Vec<f64> {
        self.diagonal.clone()
    }

    fn apply(&self, rhs: MatRef<'_, f64>) -> Mat<f64> {
        let n = self.size();
        assert_eq!(
            n,
            rhs.nrows(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            n,
            rhs.nrows(),
        );

        // out[:, j] = sum_l A[:, l] * rhs[l, j], one generated column at a time.
        let mut out = Mat::<f64>::zeros(n, rhs.ncols());
        for l in 0..n {
            for j in 0..rhs.ncols() {
                let x = rhs[(l, j)];
                if x == 0.0 {
                    continue;
                }
                for i in 0..n {
                    out[(i, j)] += self.entry(i, l) * x;
                }
            }
        }
        out
    }
}
