//! Error types of the Davidson solver.
//!
//! Every failure the Davidson solver can report is collected in a single enum,
//! [`DavidsonErrorKind`], wrapped by the public [`DavidsonError`] newtype.
//!
//! Non-convergence within the iteration cap is deliberately *not* part of this
//! module: it is reported through [`crate::solvers::DavidsonResult::converged`].
//!
//! [`faer::linalg::evd::EvdError`] is not a [`std::error::Error`], so it is carried
//! as a plain payload and formatted with `Debug`.
use thiserror::Error;

/// Represents all possible errors that can occur during a Davidson solve.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct DavidsonError(#[from] DavidsonErrorKind);

/// Private enum containing the distinct kinds of errors.
#[derive(Error, Debug, PartialEq)]
pub(crate) enum DavidsonErrorKind {
    /// An unrecognized correction or linear-solve method name was supplied
    /// while configuring the solver.
    #[error("Not a valid {kind} method: '{value}'")]
    InvalidMethod { kind: &'static str, value: String },

    /// Indicates that an invalid input parameter was provided to a function.
    #[error("Invalid input parameter: {0}")]
    InputError(String),

    /// A correction vector (or one of the quantities used to build it) collapsed
    /// to zero or became non-finite, so it cannot extend the search space.
    #[error("Numerical degeneracy at iteration {iteration} for root {root}: {reason}")]
    NumericalDegeneracy {
        iteration: usize,
        root: usize,
        reason: DegeneracyReason,
    },

    /// Wraps an error originating from [`faer`]'s eigendecomposition module.
    #[error("A numerical error occurred during the eigendecomposition of T: {0:?}")]
    EvdError(faer::linalg::evd::EvdError),
}

/// The specific way a correction vector failed to be formed.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub(crate) enum DegeneracyReason {
    #[error("correction vector has (numerically) zero norm")]
    ZeroNorm,

    #[error("correction vector contains non-finite entries")]
    NonFinite,

    #[error("Olsen denominator q^T (λ - D)^-1 q vanished")]
    OlsenDenominator,
}

impl DavidsonError {
    pub(crate) fn degeneracy(iteration: usize, root: usize, reason: DegeneracyReason) -> Self {
        DavidsonErrorKind::NumericalDegeneracy {
            iteration,
            root,
            reason,
        }
        .into()
    }

    pub(crate) fn input(message: impl Into<String>) -> Self {
        DavidsonErrorKind::InputError(message.into()).into()
    }

    /// Returns `true` when the error reports a numerically degenerate correction.
    pub fn is_numerical_degeneracy(&self) -> bool {
        matches!(self.0, DavidsonErrorKind::NumericalDegeneracy { .. })
    }

    /// Returns `true` when the error reports an unknown method name.
    pub fn is_invalid_method(&self) -> bool {
        matches!(self.0, DavidsonErrorKind::InvalidMethod { .. })
    }

    /// Returns `true` when the error reports a violated input precondition.
    pub fn is_input_error(&self) -> bool {
        matches!(self.0, DavidsonErrorKind::InputError(_))
    }
}

// Errors compare by kind and payload.
impl PartialEq for DavidsonError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_method_message() {
        let error = DavidsonError(DavidsonErrorKind::InvalidMethod {
            kind: "correction",
            value: "NEWTON".to_string(),
        });
        assert_eq!(error.to_string(), "Not a valid correction method: 'NEWTON'");
        assert!(error.is_invalid_method());
    }

    #[test]
    fn test_input_error_message() {
        let error = DavidsonError(DavidsonErrorKind::InputError(
            "requested 12 eigenpairs from an operator of size 10".to_string(),
        ));
        let expected_message =
            "Invalid input parameter: requested 12 eigenpairs from an operator of size 10";
        assert_eq!(error.to_string(), expected_message);
        assert!(error.is_input_error());
    }

    #[test]
    fn test_numerical_degeneracy_message() {
        let error = DavidsonError::degeneracy(3, 1, DegeneracyReason::ZeroNorm);
        let expected_message = "Numerical degeneracy at iteration 3 for root 1: correction vector has (numerically) zero norm";
        assert_eq!(error.to_string(), expected_message);
        assert!(error.is_numerical_degeneracy());
        assert!(!error.is_input_error());
    }

    #[test]
    fn test_errors_compare_by_kind() {
        let a = DavidsonError::degeneracy(0, 2, DegeneracyReason::OlsenDenominator);
        let b = DavidsonError::degeneracy(0, 2, DegeneracyReason::OlsenDenominator);
        assert_eq!(a, b);
        assert_ne!(a, DavidsonError::input("k must be positive"));
    }

    #[test]
    fn test_evd_error_message() {
        let evd_error = faer::linalg::evd::EvdError::NoConvergence;
        let error = DavidsonError(DavidsonErrorKind::EvdError(evd_error));
        let expected_message =
            "A numerical error occurred during the eigendecomposition of T: NoConvergence";
        assert_eq!(error.to_string(), expected_message);
    }
}
