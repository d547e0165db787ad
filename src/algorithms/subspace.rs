//! Search-space management: the growable basis `V`, its orthogonalization, and the
//! projected matrix `T = V^T A V`.
//!
//! The projection is the only place where the full operator touches the small
//! dense problem. Rebuilding it from scratch costs one product per basis column,
//! so between restarts only the columns appended since the last update are applied
//! to the operator ([`update_projected_matrix`]).

use crate::matrix::SymmetricOperator;
use faer::{Mat, MatRef};

/// The trial basis `V`: an `N x m` matrix grown one column at a time.
///
/// Columns pushed through [`SearchSpace::push_column`] are expected to be
/// normalized. Orthogonality is restored in bulk by [`SearchSpace::orthonormalize`].
#[derive(Debug, Clone)]
pub struct SearchSpace {
    basis: Mat<f64>,
}

impl SearchSpace {
    /// Wraps an existing basis.
    pub fn new(basis: Mat<f64>) -> Self {
        Self { basis }
    }

    /// Dimension `N` of the ambient space.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.basis.nrows()
    }

    /// Current subspace dimension `m`.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.basis.ncols()
    }

    /// A view of the basis.
    #[inline]
    pub fn basis(&self) -> MatRef<'_, f64> {
        self.basis.as_ref()
    }

    /// Reserves room for `additional` more columns.
    pub fn reserve(&mut self, additional: usize) {
        let (nrows, ncols) = (self.nrows(), self.ncols());
        self.basis.reserve(nrows, ncols + additional);
    }

    /// Appends a (normalized) column to the basis.
    ///
    /// # Panics
    ///
    /// Panics if `column` is not an `N x 1` matrix.
    pub fn push_column(&mut self, column: MatRef<'_, f64>) {
        assert_eq!(
            (column.nrows(), column.ncols()),
            (self.nrows(), 1),
            "Dimension mismatch: expected an {} x 1 column.",
            self.nrows(),
        );
        debug_assert!((column.norm_l2() - 1.0).abs() < 1e-8);

        let (nrows, ncols) = (self.nrows(), self.ncols());
        self.basis.resize_with(nrows, ncols + 1, |_, _| 0.0);
        self.basis.col_mut(ncols).copy_from(column.col(0));
    }

    /// Replaces the basis with an orthonormal basis of the same span (see [`orthonormalize`]).
    pub fn orthonormalize(&mut self) {
        self.basis = orthonormalize(self.basis.as_ref());
    }
}

/// Returns the permutation that sorts `values` ascending.
///
/// The sort is stable, so equal values keep their original relative order.
pub fn sort_index(values: &[f64]) -> Vec<usize> {
    let mut index: Vec<usize> = (0..values.len()).collect();
    index.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    index
}

/// Builds the initial trial basis from the operator diagonal.
///
/// Column `j` is the unit vector `e_i`, where `i` is the position of the `j`-th
/// smallest diagonal entry. For a diagonally dominant operator these are the best
/// available single-entry approximations of the lowest eigenvectors.
pub fn initial_guess(diagonal: &[f64], size: usize) -> Mat<f64> {
    let mut guess = Mat::<f64>::zeros(diagonal.len(), size);
    for (j, &row) in sort_index(diagonal).iter().take(size).enumerate() {
        guess[(row, j)] = 1.0;
    }
    guess
}

/// Thin Householder QR of `v`, returning the leading `min(rows, cols)` columns of Q.
///
/// Each column of Q is oriented so that the matching diagonal entry of R is
/// non-negative. An already orthonormal leading block of `v` therefore comes back
/// unchanged (up to rounding), which keeps a projected matrix built on that block valid.
pub fn orthonormalize(v: MatRef<'_, f64>) -> Mat<f64> {
    let rank = v.nrows().min(v.ncols());
    let mut q = v.qr().compute_thin_Q();

    for j in 0..rank {
        // q_j^T v_j is the diagonal entry R_jj.
        let r_jj: f64 = q.col(j).transpose() * v.col(j);
        if r_jj < 0.0 {
            for i in 0..q.nrows() {
                q[(i, j)] = -q[(i, j)];
            }
        }
    }
    q
}

/// Computes the full projection `T = V^T (A V)`.
pub fn project<O>(operator: &O, v: MatRef<'_, f64>) -> Mat<f64>
where
    O: SymmetricOperator + ?Sized,
{
    let av = operator.apply(v);
    v.transpose() * av.as_ref()
}

/// Extends the projected matrix `t` (of size `m0`) to the grown basis `v` (of size `m`).
///
/// Only the `m - m0` new columns of `v` are applied to the operator. The new
/// columns of the result are `V^T (A V[:, m0..m])`; the new rows to the left of the
/// diagonal block are their transpose. The leading `m0 x m0` block is reused, which
/// requires the first `m0` columns of `v` to be the basis `t` was built on.
pub fn update_projected_matrix<O>(t: &Mat<f64>, operator: &O, v: MatRef<'_, f64>) -> Mat<f64>
where
    O: SymmetricOperator + ?Sized,
{
    let m0 = t.nrows();
    let m = v.ncols();
    assert!(
        m0 <= m,
        "The basis ({m} columns) is smaller than the projected matrix ({m0} x {m0})."
    );
    if m == m0 {
        return t.clone();
    }

    let product = operator.apply(v.get(.., m0..m));
    let block = v.transpose() * product.as_ref();

    Mat::from_fn(m, m, |i, j| {
        if j >= m0 {
            block[(i, j - m0)]
        } else if i >= m0 {
            block[(j, i - m0)]
        } else {
            t[(i, j)]
        }
    })
}
